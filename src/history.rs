use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::file_utils;
use crate::transcode::ProcessedArtifact;

/// A queued `ProcessedArtifact` annotated with when it entered history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub artifact: ProcessedArtifact,
    pub added_to_history_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedHistoryFile {
    saved_at: i64,
    persisted_history: Vec<HistoryEntry>,
}

struct HistoryState {
    playback: Vec<HistoryEntry>,
    persisted: Vec<HistoryEntry>,
}

/// Dual-tier LIFO history: a small in-memory "playback" tier for fast
/// "previous" navigation, and a much larger on-disk "persisted" tier that
/// survives restarts. Dedup happens only on insert, never on load.
pub struct HistoryManager {
    state: Mutex<HistoryState>,
    playback_capacity: usize,
    persisted_capacity: usize,
    persisted_history_path: PathBuf,
}

impl HistoryManager {
    pub fn new(cache_dir: &Path, playback_capacity: usize, persisted_capacity: usize) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                playback: Vec::new(),
                persisted: Vec::new(),
            }),
            playback_capacity: playback_capacity.max(1),
            persisted_capacity: persisted_capacity.max(1),
            persisted_history_path: cache_dir.join("persisted-history.json"),
        }
    }

    /// Loads the persisted tier from disk. A missing or corrupt file leaves
    /// it empty, per the "single writer, best-effort reader" contract
    /// shared by every persisted-state file in this crate.
    pub async fn load_from_disk(&self) {
        let Some(file) =
            file_utils::read_json_file_opt::<PersistedHistoryFile>(&self.persisted_history_path)
        else {
            return;
        };
        self.state.lock().await.persisted = file.persisted_history;
    }

    /// Adds `entry` to both tiers, deduping by `originalPath` first and
    /// clamping to capacity. Entries tagged as having come *from*
    /// history (a client stepping back) are never re-added, or they'd
    /// resurrect themselves at the head forever.
    pub async fn add_to_history(&self, artifact: ProcessedArtifact, from_history: bool) {
        if from_history {
            return;
        }
        let entry = HistoryEntry {
            artifact,
            added_to_history_at: now_ms(),
        };

        {
            let mut guard = self.state.lock().await;
            remove_by_original_path(&mut guard.playback, &entry.artifact.original_path);
            remove_by_original_path(&mut guard.persisted, &entry.artifact.original_path);
            guard.playback.insert(0, entry.clone());
            guard.persisted.insert(0, entry);
            guard.playback.truncate(self.playback_capacity);
            guard.persisted.truncate(self.persisted_capacity);
        }
        self.persist().await;
    }

    /// Pops the most recent entry: playback tier first, falling back
    /// to persisted. Popping from playback also removes the matching
    /// `originalPath` from persisted, so a video is never returned twice.
    pub async fn get_previous_video(&self) -> Option<HistoryEntry> {
        let popped = {
            let mut guard = self.state.lock().await;
            if !guard.playback.is_empty() {
                let entry = guard.playback.remove(0);
                remove_by_original_path(&mut guard.persisted, &entry.artifact.original_path);
                Some(entry)
            } else if !guard.persisted.is_empty() {
                Some(guard.persisted.remove(0))
            } else {
                None
            }
        };
        if popped.is_some() {
            self.persist().await;
        }
        popped
    }

    pub async fn playback_tier(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.playback.clone()
    }

    pub async fn persisted_tier(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.persisted.clone()
    }

    pub async fn persisted_count(&self) -> usize {
        self.state.lock().await.persisted.len()
    }

    async fn persist(&self) {
        let persisted_history = self.state.lock().await.persisted.clone();
        let file = PersistedHistoryFile {
            saved_at: now_ms(),
            persisted_history,
        };
        if let Err(err) = file_utils::write_json_file(&self.persisted_history_path, &file) {
            tracing::error!(error = %err, "failed to persist history to disk");
        }
    }
}

fn remove_by_original_path(entries: &mut Vec<HistoryEntry>, original_path: &str) {
    entries.retain(|e| e.artifact.original_path != original_path);
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
