use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::file_utils;
use crate::history::HistoryEntry;
use crate::transcode::{derive_crossfade_timing, ProcessedArtifact};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub total_videos: usize,
    pub preprocessed_queue_size: usize,
    pub persisted_history_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStateSnapshot {
    pub saved_at: i64,
    pub config_hash: String,
    pub combined_queue: Vec<ProcessedArtifact>,
    pub playback_history: Vec<HistoryEntry>,
    pub stats: QueueStats,
}

/// Owns the combined queue/history snapshot (`queue-state.json`).
pub struct PersistStore {
    queue_state_path: PathBuf,
}

impl PersistStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            queue_state_path: cache_dir.join("queue-state.json"),
        }
    }

    /// Writes `{savedAt, configHash, combinedQueue, playbackHistory, stats}`
    /// where `combinedQueue` is the client-side playback queue followed by
    /// the server's own preprocessed queue.
    pub fn save(
        &self,
        config_hash: &str,
        client_playback_queue: &[ProcessedArtifact],
        preprocessed_queue: &[ProcessedArtifact],
        playback_history: Vec<HistoryEntry>,
        stats: QueueStats,
    ) -> anyhow::Result<()> {
        let mut combined_queue = client_playback_queue.to_vec();
        combined_queue.extend(preprocessed_queue.iter().cloned());
        let snapshot = QueueStateSnapshot {
            saved_at: now_ms(),
            config_hash: config_hash.to_string(),
            combined_queue,
            playback_history,
            stats,
        };
        file_utils::write_json_file(&self.queue_state_path, &snapshot)
    }

    /// Loads the snapshot, rejecting it outright when `configHash` no
    /// longer matches the running config. Restores only entries
    /// whose original AND processed files both still exist; deletes
    /// orphaned processed files (processed present, original gone) as a
    /// side effect; recomputes missing crossfade timing from duration.
    pub fn load(&self, current_config_hash: &str) -> Option<QueueStateSnapshot> {
        let mut snapshot =
            file_utils::read_json_file_opt::<QueueStateSnapshot>(&self.queue_state_path)?;
        if snapshot.config_hash != current_config_hash {
            tracing::info!("queue-state snapshot config hash mismatch, discarding");
            return None;
        }

        let mut restored = Vec::with_capacity(snapshot.combined_queue.len());
        for mut artifact in snapshot.combined_queue.drain(..) {
            let original_exists = Path::new(&artifact.original_path).exists();
            let processed_exists = Path::new(&artifact.processed_path).exists();
            if original_exists && processed_exists {
                if artifact.crossfade_timing.is_none() {
                    artifact.crossfade_timing = derive_crossfade_timing(artifact.metadata.duration);
                }
                restored.push(artifact);
            } else if processed_exists {
                tracing::info!(path = %artifact.processed_path, "original source gone, deleting orphaned processed file");
                if let Err(err) = fs::remove_file(&artifact.processed_path) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %artifact.processed_path, error = %err, "failed to delete orphaned processed file");
                    }
                }
            }
        }
        snapshot.combined_queue = restored;
        Some(snapshot)
    }
}

/// Builds the GC preserve set: basenames of every `processedPath` in
/// the live queue, the live playback history tier, and (if present) the
/// last saved snapshot's `combinedQueue`/`playbackHistory`.
pub fn build_preserve_set(
    queue_processed_paths: &[String],
    playback_processed_paths: &[String],
    last_snapshot: Option<&QueueStateSnapshot>,
) -> HashSet<String> {
    let mut preserve = HashSet::new();
    for path in queue_processed_paths.iter().chain(playback_processed_paths.iter()) {
        insert_basename(&mut preserve, path);
    }
    if let Some(snapshot) = last_snapshot {
        for artifact in &snapshot.combined_queue {
            insert_basename(&mut preserve, &artifact.processed_path);
        }
        for entry in &snapshot.playback_history {
            insert_basename(&mut preserve, &entry.artifact.processed_path);
        }
    }
    preserve
}

fn insert_basename(set: &mut HashSet<String>, path: &str) {
    if let Some(name) = Path::new(path).file_name().and_then(|n| n.to_str()) {
        set.insert(name.to_string());
    }
}

/// Deletes every file directly under `temp_dir` whose basename is absent
/// from `preserve`. `ENOENT`/transient removal failures are logged, not
/// propagated — a single stuck file must never abort the sweep.
pub fn cleanup_temp_dir(temp_dir: &Path, preserve: &HashSet<String>) -> usize {
    let read_dir = match fs::read_dir(temp_dir) {
        Ok(rd) => rd,
        Err(err) => {
            tracing::warn!(dir = %temp_dir.display(), error = %err, "failed to read temp dir during gc");
            return 0;
        }
    };

    let mut removed = 0;
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if preserve.contains(basename) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to remove orphaned temp file during gc"),
        }
    }
    removed
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Metadata;

    fn artifact(original: &str, processed: &str) -> ProcessedArtifact {
        ProcessedArtifact {
            original_path: original.to_string(),
            filename: original.to_string(),
            directory: "/videos".to_string(),
            added_at: 0,
            seasonal_directory: None,
            metadata: Metadata::default(),
            processed_path: processed.to_string(),
            video_id: "id".to_string(),
            processed_at: 0,
            crossfade_timing: None,
            output_audio_channels: 2,
            output_channel_layout: "stereo".to_string(),
            audio_processing_applied: "none".to_string(),
            reprocessed: false,
        }
    }

    #[test]
    fn save_then_load_round_trips_with_matching_hash() {
        let cache_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let original = scratch.path().join("a.mp4");
        let processed = scratch.path().join("processed_a.mp4");
        fs::write(&original, b"x").unwrap();
        fs::write(&processed, b"y").unwrap();

        let store = PersistStore::new(cache_dir.path());
        let artifact = artifact(
            original.to_str().unwrap(),
            processed.to_str().unwrap(),
        );
        store
            .save("hash1", &[], &[artifact], Vec::new(), QueueStats::default())
            .unwrap();

        let loaded = store.load("hash1").unwrap();
        assert_eq!(loaded.combined_queue.len(), 1);
    }

    #[test]
    fn load_rejects_snapshot_on_hash_mismatch() {
        let cache_dir = tempfile::tempdir().unwrap();
        let store = PersistStore::new(cache_dir.path());
        store
            .save("hash1", &[], &[], Vec::new(), QueueStats::default())
            .unwrap();
        assert!(store.load("hash2").is_none());
    }

    #[test]
    fn load_drops_entries_with_missing_original_and_deletes_orphan() {
        let cache_dir = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let processed = scratch.path().join("processed_orphan.mp4");
        fs::write(&processed, b"y").unwrap();

        let store = PersistStore::new(cache_dir.path());
        let artifact = artifact("/definitely/missing.mp4", processed.to_str().unwrap());
        store
            .save("hash1", &[], &[artifact], Vec::new(), QueueStats::default())
            .unwrap();

        let loaded = store.load("hash1").unwrap();
        assert!(loaded.combined_queue.is_empty());
        assert!(!processed.exists());
    }

    #[test]
    fn preserve_set_collects_basenames_from_live_and_snapshot_sources() {
        let snapshot = QueueStateSnapshot {
            saved_at: 0,
            config_hash: "h".to_string(),
            combined_queue: vec![artifact("/o1.mp4", "/tmp/processed_1.mp4")],
            playback_history: Vec::new(),
            stats: QueueStats::default(),
        };
        let preserve = build_preserve_set(
            &["/tmp/processed_2.mp4".to_string()],
            &[],
            Some(&snapshot),
        );
        assert!(preserve.contains("processed_1.mp4"));
        assert!(preserve.contains("processed_2.mp4"));
    }

    #[test]
    fn cleanup_removes_only_unpreserved_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("keep.mp4"), b"x").unwrap();
        fs::write(temp_dir.path().join("orphan.mp4"), b"x").unwrap();

        let mut preserve = HashSet::new();
        preserve.insert("keep.mp4".to_string());

        let removed = cleanup_temp_dir(temp_dir.path(), &preserve);
        assert_eq!(removed, 1);
        assert!(temp_dir.path().join("keep.mp4").exists());
        assert!(!temp_dir.path().join("orphan.mp4").exists());
    }
}
