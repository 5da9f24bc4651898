//! Naming rules shared by the tree API and the blob directory.

use crate::error::AppError;

pub fn clean_name(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidName("name must not be empty".into()));
    }
    Ok(trimmed.to_string())
}

pub fn clean_file_name(raw: &str) -> Result<String, AppError> {
    let name = clean_name(raw)?;
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(AppError::InvalidName(format!(
            "{name} is not a single path segment"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(AppError::InvalidName(
            "name contains control characters".into(),
        ));
    }
    Ok(name)
}

pub fn sanitize_upload_name(raw: &str) -> Option<String> {
    let segment = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let sanitized: String = segment.chars().filter(|ch| !ch.is_control()).collect();
    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        None
    } else {
        Some(sanitized.to_string())
    }
}

pub fn requested_file_name(original: &str, display: Option<&str>) -> Result<String, AppError> {
    let display = display.map(str::trim).filter(|value| !value.is_empty());
    let raw = match display {
        Some(name) if !name.contains('.') => match extension_of(original) {
            Some(ext) => format!("{name}.{ext}"),
            None => name.to_string(),
        },
        Some(name) => name.to_string(),
        None => original.to_string(),
    };
    sanitize_upload_name(&raw)
        .ok_or_else(|| AppError::InvalidName(format!("invalid file name: {raw:?}")))
}

pub fn extension_of(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx + 1..].to_ascii_lowercase()),
        _ => None,
    }
}

pub fn numbered(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => format!("{} ({attempt}){}", &name[..idx], &name[idx..]),
        _ => format!("{name} ({attempt})"),
    }
}
