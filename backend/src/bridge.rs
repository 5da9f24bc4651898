//! Keeps a file's blob and its tree entry in step on rename and delete.

use tracing::warn;

use crate::{
    blobs::BlobDir,
    error::AppError,
    models::nodes::{FileNode, FolderNode, ROOT_ID},
    names,
    store::TreeStore,
};

/// Renames the blob first, then the tree entry, undoing the blob rename if
/// the tree update fails. Renaming to the current name does no I/O.
pub async fn rename_file(
    store: &TreeStore,
    blobs: &BlobDir,
    id: &str,
    new_name: &str,
) -> Result<(), AppError> {
    let name = names::clean_file_name(new_name)?;
    let current = store
        .find_file(id)
        .ok_or_else(|| AppError::NotFound(format!("file {id}")))?;
    if current.name == name {
        return Ok(());
    }

    let staged = blobs.stage_rename(&current.name, &name).await?;
    staged.commit_or_undo(|| store.rename_file(id, &name)).await
}

pub async fn delete_file(store: &TreeStore, blobs: &BlobDir, id: &str) -> Result<FileNode, AppError> {
    let current = store
        .find_file(id)
        .ok_or_else(|| AppError::NotFound(format!("file {id}")))?;

    if let Err(err) = blobs.remove(&current.name).await {
        warn!(id, name = %current.name, error = %err, "failed to remove blob, deleting entry anyway");
    }

    store.delete_file(id)
}

pub async fn delete_folder(
    store: &TreeStore,
    blobs: &BlobDir,
    id: &str,
) -> Result<FolderNode, AppError> {
    if id == ROOT_ID {
        return Err(AppError::BadRequest("the root folder cannot be deleted".into()));
    }
    let folder = store
        .find_folder(id)
        .ok_or_else(|| AppError::NotFound(format!("folder {id}")))?;

    for listing in folder.all_files() {
        let name = &listing.file.name;
        if let Err(err) = blobs.remove(name).await {
            warn!(folder = id, file = %listing.file.id, %name, error = %err, "failed to remove blob of deleted folder");
        }
    }

    store.delete_folder(id)
}
