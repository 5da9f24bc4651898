//! The public directory holding one blob per file node, named after the node.

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, error, warn};

use crate::{error::AppError, names};

#[derive(Debug, Clone)]
pub struct BlobDir {
    root: PathBuf,
}

impl BlobDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn exists(&self, name: &str) -> Result<bool, AppError> {
        Ok(fs::try_exists(self.path_of(name)).await?)
    }

    pub async fn write_unique(&self, name: &str, bytes: &[u8]) -> Result<String, AppError> {
        fs::create_dir_all(&self.root).await?;

        let mut attempt = 0;
        loop {
            let candidate = names::numbered(name, attempt);
            let path = self.path_of(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    if let Err(err) = write_all(&mut file, bytes).await {
                        drop(file);
                        if let Err(cleanup) = fs::remove_file(&path).await {
                            warn!(path = %path.display(), error = %cleanup, "failed to remove partial blob");
                        }
                        return Err(err.into());
                    }
                    debug!(name = %candidate, attempt, bytes = bytes.len(), "stored blob");
                    return Ok(candidate);
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// First phase of a rename: moves the blob and returns a handle that can
    /// put it back. Never overwrites an existing blob.
    pub async fn stage_rename(&self, from: &str, to: &str) -> Result<StagedRename, AppError> {
        let staged = StagedRename {
            from: self.path_of(from),
            to: self.path_of(to),
        };
        match move_no_clobber(&staged.from, &staged.to).await {
            Ok(()) => Ok(staged),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(AppError::InvalidName(
                format!("a file named {to} already exists"),
            )),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn remove(&self, name: &str) -> Result<(), AppError> {
        fs::remove_file(self.path_of(name)).await?;
        Ok(())
    }
}

// link then unlink: the link fails if `to` exists, where rename would replace it
async fn move_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    fs::hard_link(from, to).await?;
    if let Err(err) = fs::remove_file(from).await {
        let _ = fs::remove_file(to).await;
        return Err(err);
    }
    Ok(())
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await
}

/// A blob rename that has happened on disk but whose tree update is pending.
#[derive(Debug)]
#[must_use = "a staged rename must be committed or undone"]
pub struct StagedRename {
    from: PathBuf,
    to: PathBuf,
}

impl StagedRename {
    /// Runs the tree update. If it fails the blob is moved back and the
    /// update's error is returned.
    pub async fn commit_or_undo<T>(
        self,
        commit: impl FnOnce() -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        match commit() {
            Ok(value) => Ok(value),
            Err(err) => {
                if let Err(undo_err) = self.undo().await {
                    error!(error = %undo_err, "failed to revert blob rename");
                }
                Err(err)
            }
        }
    }

    pub async fn undo(self) -> Result<(), AppError> {
        move_no_clobber(&self.to, &self.from).await?;
        warn!(
            from = %self.to.display(),
            to = %self.from.display(),
            "reverted blob rename"
        );
        Ok(())
    }
}
