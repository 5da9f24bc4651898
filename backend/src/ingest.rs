use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    blobs::BlobDir,
    error::AppError,
    models::nodes::{FileKind, FileNode},
    names,
    store::TreeStore,
};

pub struct ProcessFileOptions<'a> {
    pub store: &'a TreeStore,
    pub blobs: &'a BlobDir,
    pub parent_id: &'a str,
    pub original_name: &'a str,
    pub display_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

/// Stores an upload. The blob is written before the tree learns about it, so
/// the tree never points at a missing blob; a blob left behind by a failed
/// tree insert is tolerated.
pub async fn process_uploaded_file(options: ProcessFileOptions<'_>) -> Result<FileNode, AppError> {
    let ProcessFileOptions {
        store,
        blobs,
        parent_id,
        original_name,
        display_name,
        content_type,
        bytes,
    } = options;

    if store.find_folder(parent_id).is_none() {
        return Err(AppError::NotFound(format!("folder {parent_id}")));
    }

    let requested = names::requested_file_name(original_name, display_name)?;
    let kind = FileKind::infer(&requested, content_type);
    let stored_name = blobs.write_unique(&requested, bytes).await?;

    let now = Utc::now();
    let file = FileNode {
        id: Uuid::new_v4().to_string(),
        name: stored_name,
        kind,
        uploaded_at: now,
        last_updated: now,
        parent_id: Some(parent_id.to_string()),
    };

    if let Err(err) = store.insert_file(parent_id, file.clone()) {
        warn!(
            parent = parent_id,
            blob = %blobs.path_of(&file.name).display(),
            error = %err,
            "blob stored but tree insert failed"
        );
        return Err(err);
    }

    info!(
        id = %file.id,
        parent = parent_id,
        name = %file.name,
        kind = ?file.kind,
        bytes = bytes.len(),
        "stored uploaded file"
    );
    Ok(file)
}
