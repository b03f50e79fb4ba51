use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};

use crate::config::Config;
use crate::index::IndexStore;
use crate::queue::PreprocessedQueue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    LoadingConfig,
    BuildingIndex,
    FillingQueue,
    Retrying,
    Complete,
    Error,
}

impl Stage {
    /// Fixed progress checkpoint for stages that don't otherwise carry a
    /// finer-grained percentage.
    fn progress(self) -> u8 {
        match self {
            Stage::NotStarted => 0,
            Stage::LoadingConfig => 5,
            Stage::BuildingIndex => 30,
            Stage::FillingQueue => 70,
            Stage::Retrying => 30,
            Stage::Complete => 100,
            Stage::Error => 100,
        }
    }
}

/// Broadcast on every stage change, including over the `initialization-update` WebSocket event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializationState {
    pub stage: Stage,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub attempt: u32,
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl InitializationState {
    fn stage(stage: Stage, attempt: u32) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: None,
            attempt,
        }
    }
}

/// Staged startup state machine: `loading_config -> building_index
/// -> filling_queue -> complete | error`, with retry/backoff and a hard
/// total timeout. Holds the `watch` sender that every subscriber (WebSocket
/// clients, `/api/initialization-status`) observes.
pub struct InitController {
    sender: watch::Sender<InitializationState>,
}

impl InitController {
    pub fn new() -> (Self, watch::Receiver<InitializationState>) {
        let (sender, receiver) = watch::channel(InitializationState::stage(Stage::NotStarted, 0));
        (Self { sender }, receiver)
    }

    pub fn current(&self) -> InitializationState {
        self.sender.borrow().clone()
    }

    fn publish(&self, state: InitializationState) {
        tracing::info!(stage = ?state.stage, attempt = state.attempt, "initialization stage change");
        let _ = self.sender.send(state);
    }

    /// Runs the startup sequence once. On success the controller ends in
    /// `Stage::Complete` with the queue filled to `target_queue_size`; on
    /// exhausted retries or a zero-video index it ends in `Stage::Error`
    /// with a user-facing `message`.
    pub async fn run(
        &self,
        index: &RwLock<IndexStore>,
        queue: &PreprocessedQueue,
        config: &Config,
        temp_dir: &std::path::Path,
        target_queue_size: usize,
        last_index_update_ms: &AtomicI64,
    ) {
        let started = Instant::now();
        let total_timeout = Duration::from_millis(config.retries.initialization_total_timeout_ms);
        let max_attempts = config.retries.max_initialization_attempts.max(1);
        let backoff = Duration::from_millis(config.retries.initialization_backoff_ms);

        self.publish(InitializationState::stage(Stage::LoadingConfig, 0));

        for attempt in 1..=max_attempts {
            if started.elapsed() >= total_timeout {
                self.publish(InitializationState {
                    stage: Stage::Error,
                    progress: Stage::Error.progress(),
                    message: Some("initialization exceeded its total time budget".to_string()),
                    attempt,
                });
                return;
            }

            self.publish(InitializationState::stage(Stage::BuildingIndex, attempt));
            {
                let mut guard = index.write().await;
                if guard.needs_rebuild(config) {
                    guard.rebuild(config, |scan| {
                        // Scale the scan's own 0..100 within the BuildingIndex
                        // stage's LoadingConfig..FillingQueue checkpoint window.
                        let progress = Stage::LoadingConfig.progress()
                            + ((Stage::BuildingIndex.progress() - Stage::LoadingConfig.progress()) as u32
                                * scan.percent
                                / 100) as u8;
                        self.publish(InitializationState {
                            stage: Stage::BuildingIndex,
                            progress,
                            message: Some(scan.message),
                            attempt,
                        });
                    });
                    if let Err(err) = guard.save_to_disk() {
                        tracing::warn!(error = %err, "failed to persist rebuilt index");
                    }
                } else {
                    guard.load_from_disk();
                }
            }
            last_index_update_ms.store(now_ms(), Ordering::Relaxed);

            let total_videos = index.read().await.total_videos();
            if total_videos == 0 {
                tracing::warn!(attempt, "index build produced zero videos");
                if attempt >= max_attempts {
                    self.publish(InitializationState {
                        stage: Stage::Error,
                        progress: Stage::Error.progress(),
                        message: Some("no videos found in any configured directory".to_string()),
                        attempt,
                    });
                    return;
                }
                self.publish(InitializationState {
                    stage: Stage::Retrying,
                    progress: Stage::Retrying.progress(),
                    message: Some(format!("retrying after finding zero videos (attempt {attempt}/{max_attempts})")),
                    attempt,
                });
                tokio::time::sleep(backoff.saturating_mul(attempt)).await;
                continue;
            }

            self.publish(InitializationState::stage(Stage::FillingQueue, attempt));
            queue.fill(target_queue_size, index, config, temp_dir).await;

            self.publish(InitializationState::stage(Stage::Complete, attempt));
            return;
        }
    }

    /// A late-connecting client must always observe a consistent snapshot:
    /// periodically re-publish `Complete`
    /// once it has been reached, so the channel never goes stale even if
    /// nothing else changes it again.
    pub fn spawn_consistency_guard(
        self: Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let current = self.current();
                if current.stage == Stage::Complete {
                    self.publish(current);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn completes_when_index_has_videos() {
        let scan_dir = tempfile::tempdir().unwrap();
        fs::write(scan_dir.path().join("a.mp4"), b"x").unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();

        let mock = env!("CARGO_BIN_EXE_mock_ffmpeg");
        let mut config = Config::default();
        config.directories = vec![scan_dir.path().to_string_lossy().into_owned()];
        config.tools.ffmpeg_path = mock.to_string();
        config.tools.ffprobe_path = mock.to_string();

        let index = RwLock::new(IndexStore::new(cache_dir.path().to_path_buf()));
        let queue = PreprocessedQueue::new();
        let (controller, rx) = InitController::new();

        let last_index_update_ms = AtomicI64::new(0);
        controller
            .run(&index, &queue, &config, temp_dir.path(), 1, &last_index_update_ms)
            .await;
        assert_eq!(rx.borrow().stage, Stage::Complete);
        assert!(last_index_update_ms.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn errors_when_no_videos_found() {
        let cache_dir = tempfile::tempdir().unwrap();
        let temp_dir = tempfile::tempdir().unwrap();

        let mut config = Config::default();
        config.directories = vec![tempfile::tempdir().unwrap().path().to_string_lossy().into_owned()];
        config.retries.max_initialization_attempts = 1;
        config.retries.initialization_backoff_ms = 1;

        let index = RwLock::new(IndexStore::new(cache_dir.path().to_path_buf()));
        let queue = PreprocessedQueue::new();
        let (controller, rx) = InitController::new();

        let last_index_update_ms = AtomicI64::new(0);
        controller
            .run(&index, &queue, &config, temp_dir.path(), 1, &last_index_update_ms)
            .await;
        assert_eq!(rx.borrow().stage, Stage::Error);
        assert!(rx.borrow().message.is_some());
    }
}
