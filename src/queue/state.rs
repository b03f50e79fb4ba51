use std::path::Path;

use rand::Rng;
use tokio::sync::Mutex;

use crate::transcode::ProcessedArtifact;

#[derive(Default)]
pub(super) struct QueueInner {
    pub items: Vec<ProcessedArtifact>,
    pub is_processing: bool,
}

/// A bounded, randomly-ordered cache of `ProcessedArtifact`s. Pop is
/// random-access, not FIFO; refill is triggered by the caller observing a
/// low-water mark, never by blocking inside `get_next`.
pub struct PreprocessedQueue {
    pub(super) inner: Mutex<QueueInner>,
}

impl Default for PreprocessedQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessedQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
        }
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.items.len()
    }

    pub async fn is_processing(&self) -> bool {
        self.inner.lock().await.is_processing
    }

    pub async fn queued_original_paths(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .items
            .iter()
            .map(|a| a.original_path.clone())
            .collect()
    }

    pub async fn processed_paths(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .items
            .iter()
            .map(|a| a.processed_path.clone())
            .collect()
    }

    /// Snapshot of every queued artifact, for persistence.
    pub async fn snapshot(&self) -> Vec<ProcessedArtifact> {
        self.inner.lock().await.items.clone()
    }

    pub async fn push(&self, artifact: ProcessedArtifact) {
        self.inner.lock().await.items.push(artifact);
    }

    /// Picks a random entry, removes it, and verifies its file still
    /// exists. Retries up to 10 times against entries with missing files,
    /// logging each eviction, before giving up and returning `None`.
    pub async fn get_next(&self) -> Option<ProcessedArtifact> {
        let mut guard = self.inner.lock().await;
        let mut attempts = 0;
        loop {
            if guard.items.is_empty() || attempts >= 10 {
                return None;
            }
            let index = rand::thread_rng().gen_range(0..guard.items.len());
            let candidate = guard.items.remove(index);
            if Path::new(&candidate.processed_path).exists() {
                return Some(candidate);
            }
            tracing::warn!(
                video_id = %candidate.video_id,
                path = %candidate.processed_path,
                "evicting queued artifact with missing file"
            );
            attempts += 1;
        }
    }

    /// Removes every entry whose file is missing. Returns the number
    /// removed.
    pub async fn validate(&self) -> usize {
        let mut guard = self.inner.lock().await;
        let before = guard.items.len();
        guard.items.retain(|a| Path::new(&a.processed_path).exists());
        before - guard.items.len()
    }

    /// Deletes every artifact's file then empties the queue.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        for artifact in guard.items.drain(..) {
            if let Err(err) = std::fs::remove_file(&artifact.processed_path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %artifact.processed_path, error = %err, "failed to delete artifact during clear");
                }
            }
        }
    }

    /// True when a fill is already running; used to serialize fills one at
    /// a time.
    pub(super) async fn try_begin_fill(&self) -> bool {
        let mut guard = self.inner.lock().await;
        if guard.is_processing {
            return false;
        }
        guard.is_processing = true;
        true
    }

    pub(super) async fn end_fill(&self) {
        self.inner.lock().await.is_processing = false;
    }
}
