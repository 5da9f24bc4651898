use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::names;

pub const ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    Folder(FolderNode),
    File(FileNode),
}

/// Borrowed twin of [`Node`] used to serialize a subtree without cloning it.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeRef<'a> {
    Folder(&'a FolderNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: FileKind,
    pub uploaded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Document,
    Image,
    Video,
    Audio,
    #[default]
    Unknown,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => FileKind::Image,
            "mp4" | "mov" | "webm" | "mkv" | "avi" => FileKind::Video,
            "mp3" | "wav" | "ogg" | "flac" | "m4a" => FileKind::Audio,
            "pdf" | "doc" | "docx" | "ppt" | "pptx" | "xls" | "xlsx" | "txt" | "md" => {
                FileKind::Document
            }
            _ => FileKind::Unknown,
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            FileKind::Image
        } else if mime.starts_with("video/") {
            FileKind::Video
        } else if mime.starts_with("audio/") {
            FileKind::Audio
        } else if mime == "application/pdf" {
            FileKind::Document
        } else {
            FileKind::Unknown
        }
    }

    /// Extension wins; the declared content type is only consulted when the
    /// extension is not recognised.
    pub fn infer(name: &str, content_type: Option<&str>) -> Self {
        let by_extension = names::extension_of(name)
            .map(|ext| Self::from_extension(&ext))
            .unwrap_or_default();
        match (by_extension, content_type) {
            (FileKind::Unknown, Some(mime)) => Self::from_mime(mime),
            (kind, _) => kind,
        }
    }
}
