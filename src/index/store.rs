use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use super::scanner::{scan_directory, ScanProgress};
use super::types::{IndexSnapshot, SeasonalIndexFile, VideoEntry};
use crate::config::{Config, SeasonalDirectoryConfig};
use crate::file_utils;

pub struct IndexStore {
    cache_dir: PathBuf,
    snapshot: IndexSnapshot,
    cached_relevant_hash: Option<String>,
    cached_seasonal_dirs: Vec<String>,
}

fn regular_index_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("video-index.json")
}

fn seasonal_index_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join("seasonal-video-index.json")
}

impl IndexStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            snapshot: IndexSnapshot::default(),
            cached_relevant_hash: None,
            cached_seasonal_dirs: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    pub fn total_videos(&self) -> usize {
        self.snapshot.regular.len()
    }

    pub fn load_from_disk(&mut self) -> bool {
        let regular: Option<Vec<VideoEntry>> =
            file_utils::read_json_file_opt(&regular_index_path(&self.cache_dir));
        let seasonal: Option<SeasonalIndexFile> =
            file_utils::read_json_file_opt(&seasonal_index_path(&self.cache_dir));

        match (regular, seasonal) {
            (Some(regular), Some(seasonal)) => {
                self.snapshot = IndexSnapshot {
                    regular,
                    seasonal: seasonal.seasonal_videos,
                };
                true
            }
            _ => false,
        }
    }

    pub fn save_to_disk(&self) -> Result<()> {
        file_utils::write_json_file(&regular_index_path(&self.cache_dir), &self.snapshot.regular)?;
        let seasonal_file = SeasonalIndexFile {
            saved_at: now_ms(),
            seasonal_videos: self.snapshot.seasonal.clone(),
        };
        file_utils::write_json_file(&seasonal_index_path(&self.cache_dir), &seasonal_file)?;
        Ok(())
    }

    /// Rebuild when: an on-disk index is missing, the relevant config hash
    /// changed since the last rebuild, or the configured seasonal directory
    /// set no longer matches what was last scanned.
    pub fn needs_rebuild(&self, config: &Config) -> bool {
        if !regular_index_path(&self.cache_dir).exists()
            || !seasonal_index_path(&self.cache_dir).exists()
        {
            return true;
        }
        let relevant_hash = crate::config::relevant_config_hash(config);
        if self.cached_relevant_hash.as_deref() != Some(relevant_hash.as_str()) {
            return true;
        }
        let configured: Vec<String> = config
            .seasonal_directories
            .iter()
            .map(|s| s.directory.clone())
            .collect();
        configured != self.cached_seasonal_dirs
    }

    /// Rescans every configured directory (regular + seasonal), replacing
    /// the in-memory snapshot. Per-directory scan errors are already
    /// isolated inside `scan_directory`.
    pub fn rebuild(&mut self, config: &Config, mut on_progress: impl FnMut(ScanProgress)) {
        let total_dirs = config.directories.len() + config.seasonal_directories.len();

        let mut regular = Vec::new();
        for (i, directory) in config.directories.iter().enumerate() {
            let entries = scan_directory(
                directory,
                &config.files.supported_video_extensions,
                None,
                i,
                total_dirs,
                &mut on_progress,
            );
            regular.extend(entries);
        }

        let mut seasonal: HashMap<String, Vec<VideoEntry>> = HashMap::new();
        let regular_count = config.directories.len();
        for (i, seasonal_dir) in config.seasonal_directories.iter().enumerate() {
            let entries = scan_directory(
                &seasonal_dir.directory,
                &config.files.supported_video_extensions,
                Some(&seasonal_dir.directory),
                regular_count + i,
                total_dirs,
                &mut on_progress,
            );
            seasonal.insert(seasonal_dir.directory.clone(), entries);
        }

        self.snapshot = IndexSnapshot { regular, seasonal };
        self.cached_relevant_hash = Some(crate::config::relevant_config_hash(config));
        self.cached_seasonal_dirs = seasonal_directory_names(&config.seasonal_directories);
    }
}

fn seasonal_directory_names(dirs: &[SeasonalDirectoryConfig]) -> Vec<String> {
    dirs.iter().map(|d| d.directory.clone()).collect()
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
