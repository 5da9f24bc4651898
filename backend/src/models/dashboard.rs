use serde::{Deserialize, Serialize};

use crate::models::files::FileListing;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub images: usize,
    pub videos: usize,
    pub audios: usize,
    pub documents: usize,
    pub others: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_files: usize,
    pub total_size: String,
    pub kinds: KindCounts,
    pub recent_files: Vec<FileListing>,
}
