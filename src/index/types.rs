use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry {
    pub original_path: String,
    pub filename: String,
    pub directory: String,
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seasonal_directory: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonalIndexFile {
    pub saved_at: i64,
    pub seasonal_videos: HashMap<String, Vec<VideoEntry>>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub regular: Vec<VideoEntry>,
    pub seasonal: HashMap<String, Vec<VideoEntry>>,
}
