//! The process-wide folder tree and its JSON document on disk.
//!
//! Each mutation runs under the write lock and writes the whole tree back
//! before the lock is released. A failed write is logged and the in-memory
//! change stands.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::AppError,
    migrate,
    models::{
        dashboard::DashboardStats,
        files::FileListing,
        folders::{FolderContents, FolderListing, FolderRef, FolderStats},
        nodes::{FileKind, FileNode, FolderNode, Node, NodeRef, ROOT_ID},
    },
    names,
};

pub struct TreeStore {
    path: PathBuf,
    root: RwLock<FolderNode>,
}

impl TreeStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let root = match fs::read(&path) {
            Ok(bytes) => {
                let mut document: Value = serde_json::from_slice(&bytes)?;
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
                let patched = migrate::upgrade(&mut document, &now);
                let root = into_root(document, &path)?;
                if patched > 0 {
                    info!(path = %path.display(), patched, "upgraded legacy tree records");
                    write_document(&path, &root)?;
                }
                root
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no tree document yet, starting empty");
                FolderNode::root()
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            root: RwLock::new(root),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), AppError> {
        let root = self.root.read();
        write_document(&self.path, &root)
    }

    fn flush(&self, root: &FolderNode) {
        if let Err(err) = write_document(&self.path, root) {
            warn!(path = %self.path.display(), error = %err, "failed to persist tree");
        }
    }

    pub fn snapshot(&self) -> FolderNode {
        self.root.read().clone()
    }

    pub fn find_folder(&self, id: &str) -> Option<FolderNode> {
        self.root.read().find_folder(id).cloned()
    }

    pub fn find_file(&self, id: &str) -> Option<FileNode> {
        self.root.read().find_file(id)
    }

    pub fn all_files(&self) -> Vec<FileListing> {
        self.root.read().all_files()
    }

    pub fn files_of_kind(&self, kind: FileKind) -> Vec<FileListing> {
        self.root.read().files_of_kind(kind)
    }

    pub fn all_folders(&self) -> Vec<FolderListing> {
        self.root.read().all_folders()
    }

    pub fn folder_stats(&self, id: &str) -> Result<FolderStats, AppError> {
        self.root
            .read()
            .find_folder(id)
            .map(FolderNode::stats)
            .ok_or_else(|| folder_not_found(id))
    }

    pub fn folder_contents(&self, id: &str) -> Result<FolderContents, AppError> {
        self.root
            .read()
            .find_folder(id)
            .map(FolderNode::contents)
            .ok_or_else(|| folder_not_found(id))
    }

    pub fn folder_path(&self, id: &str) -> Vec<FolderRef> {
        self.root.read().path_to(id)
    }

    pub fn dashboard(&self) -> DashboardStats {
        self.root.read().dashboard()
    }

    pub fn create_folder(&self, parent_id: &str, name: &str) -> Result<FolderNode, AppError> {
        let name = names::clean_name(name)?;
        let folder = FolderNode::new(name);

        let mut root = self.root.write();
        root.insert_child(parent_id, Node::Folder(folder.clone()))
            .map_err(|_| folder_not_found(parent_id))?;
        self.flush(&root);

        info!(id = %folder.id, parent = parent_id, name = %folder.name, "created folder");
        Ok(folder)
    }

    pub fn rename_folder(&self, id: &str, name: &str) -> Result<(), AppError> {
        let name = names::clean_name(name)?;
        if id == ROOT_ID {
            return Err(AppError::BadRequest("the root folder cannot be renamed".into()));
        }

        let mut root = self.root.write();
        let current = root
            .find_folder(id)
            .map(|folder| folder.name.clone())
            .ok_or_else(|| folder_not_found(id))?;
        if current == name {
            return Ok(());
        }
        root.rename_folder(id, &name);
        self.flush(&root);

        info!(id, from = %current, to = %name, "renamed folder");
        Ok(())
    }

    pub fn delete_folder(&self, id: &str) -> Result<FolderNode, AppError> {
        if id == ROOT_ID {
            return Err(AppError::BadRequest("the root folder cannot be deleted".into()));
        }

        let mut root = self.root.write();
        let removed = root.remove_folder(id).ok_or_else(|| folder_not_found(id))?;
        self.flush(&root);

        info!(id, name = %removed.name, "deleted folder");
        Ok(removed)
    }

    pub fn insert_file(&self, parent_id: &str, mut file: FileNode) -> Result<(), AppError> {
        file.parent_id = Some(parent_id.to_string());
        let mut root = self.root.write();
        if root.contains_id(&file.id) {
            return Err(AppError::BadRequest(format!("duplicate node id {}", file.id)));
        }
        root.insert_child(parent_id, Node::File(file))
            .map_err(|_| folder_not_found(parent_id))?;
        self.flush(&root);
        Ok(())
    }

    // tree entry only; the blob is renamed by `bridge::rename_file`
    pub fn rename_file(&self, id: &str, name: &str) -> Result<(), AppError> {
        let name = names::clean_file_name(name)?;

        let mut root = self.root.write();
        let current = root.find_file(id).ok_or_else(|| file_not_found(id))?;
        if current.name == name {
            return Ok(());
        }
        root.rename_file(id, &name, Utc::now());
        self.flush(&root);

        info!(id, from = %current.name, to = %name, "renamed file");
        Ok(())
    }

    pub fn delete_file(&self, id: &str) -> Result<FileNode, AppError> {
        let mut root = self.root.write();
        let removed = root.remove_file(id).ok_or_else(|| file_not_found(id))?;
        self.flush(&root);

        info!(id, name = %removed.name, "deleted file");
        Ok(removed)
    }
}

fn into_root(document: Value, path: &Path) -> Result<FolderNode, AppError> {
    match serde_json::from_value::<Node>(document)? {
        Node::Folder(mut root) if root.id == ROOT_ID => {
            if let Some(id) = root.first_duplicate_id() {
                return Err(AppError::Config(format!(
                    "{} uses id {id} more than once",
                    path.display()
                )));
            }
            root.relink_parents();
            Ok(root)
        }
        _ => Err(AppError::Config(format!(
            "{} does not hold a root folder",
            path.display()
        ))),
    }
}

fn write_document(path: &Path, root: &FolderNode) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(&NodeRef::Folder(root))?;
    fs::write(path, bytes)?;
    Ok(())
}

fn folder_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("folder {id}"))
}

fn file_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("file {id}"))
}
