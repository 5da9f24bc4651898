use std::{env, path::PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_file: PathBuf,
    pub public_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid SERVER_PORT: {err}")))?;

        let data_file = non_empty_path("FILEDECK_DATA_FILE", "./data/data.json")?;
        let public_dir = non_empty_path("FILEDECK_PUBLIC_DIR", "./public")?;
        let log_dir = non_empty_path("FILEDECK_LOG_DIR", "../log")?;

        Ok(Self {
            host,
            port,
            data_file,
            public_dir,
            log_dir,
        })
    }
}

fn non_empty_path(key: &str, default: &str) -> Result<PathBuf, AppError> {
    let value = env::var(key).unwrap_or_else(|_| default.into());
    if value.trim().is_empty() {
        return Err(AppError::Config(format!("{key} must not be empty")));
    }
    Ok(PathBuf::from(value))
}
