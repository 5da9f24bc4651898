use serde::{Deserialize, Serialize};

use crate::models::{
    folders::FolderRef,
    nodes::{FileKind, FileNode},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListing {
    #[serde(flatten)]
    pub file: FileNode,
    pub folder: FolderRef,
    pub size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub id: String,
    pub name: String,
    pub kind: FileKind,
}
