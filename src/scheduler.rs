use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};

use crate::config::Config;
use crate::history::HistoryManager;
use crate::index::IndexStore;
use crate::persist::{self, PersistStore, QueueStats};
use crate::queue::PreprocessedQueue;

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Spawns the three periodic background tasks: index refresh, temp
/// directory GC, and combined queue/history state save. Each isolates its
/// own errors on its own configured cadence — one misbehaving pass never
/// stops the others.
pub fn spawn_all(
    index: Arc<RwLock<IndexStore>>,
    queue: Arc<PreprocessedQueue>,
    history: Arc<HistoryManager>,
    persist: Arc<PersistStore>,
    temp_dir: PathBuf,
    config_rx: watch::Receiver<Config>,
    last_index_update_ms: Arc<AtomicI64>,
) -> Vec<tokio::task::JoinHandle<()>> {
    vec![
        spawn_index_refresh(index.clone(), queue.clone(), config_rx.clone(), last_index_update_ms),
        spawn_temp_cleanup(
            queue.clone(),
            history.clone(),
            persist.clone(),
            temp_dir.clone(),
            config_rx.clone(),
        ),
        spawn_state_save(index, queue, history, persist, config_rx),
    ]
}

fn spawn_index_refresh(
    index: Arc<RwLock<IndexStore>>,
    queue: Arc<PreprocessedQueue>,
    config_rx: watch::Receiver<Config>,
    last_index_update_ms: Arc<AtomicI64>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = Duration::from_millis(config_rx.borrow().video.update_interval_ms);
            tokio::time::sleep(interval).await;

            let config = config_rx.borrow().clone();
            let before = index.read().await.total_videos();
            {
                let mut guard = index.write().await;
                if guard.needs_rebuild(&config) {
                    guard.rebuild(&config, |_| {});
                    if let Err(err) = guard.save_to_disk() {
                        tracing::warn!(error = %err, "failed to persist refreshed index");
                    }
                    last_index_update_ms.store(now_ms(), Ordering::Relaxed);
                }
            }
            let after = index.read().await.total_videos();
            let delta = (before as i64 - after as i64).unsigned_abs() as usize;
            if delta > 5 {
                tracing::info!(before, after, delta, "index changed significantly, clearing preprocessed queue");
                queue.clear().await;
            }
        }
    })
}

fn spawn_temp_cleanup(
    queue: Arc<PreprocessedQueue>,
    history: Arc<HistoryManager>,
    persist: Arc<PersistStore>,
    temp_dir: PathBuf,
    config_rx: watch::Receiver<Config>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval =
                Duration::from_millis(config_rx.borrow().monitoring.periodic_cleanup_interval_ms);
            tokio::time::sleep(interval).await;

            let config = config_rx.borrow().clone();
            let config_hash = crate::config::relevant_config_hash(&config);
            let last_snapshot = persist.load(&config_hash);

            let queue_processed = queue.processed_paths().await;
            let playback_processed: Vec<String> = history
                .playback_tier()
                .await
                .into_iter()
                .map(|e| e.artifact.processed_path)
                .collect();

            let preserve = persist::build_preserve_set(
                &queue_processed,
                &playback_processed,
                last_snapshot.as_ref(),
            );
            let removed = persist::cleanup_temp_dir(&temp_dir, &preserve);
            if removed > 0 {
                tracing::info!(removed, "removed orphaned temp files during periodic cleanup");
            }
        }
    })
}

fn spawn_state_save(
    index: Arc<RwLock<IndexStore>>,
    queue: Arc<PreprocessedQueue>,
    history: Arc<HistoryManager>,
    persist: Arc<PersistStore>,
    config_rx: watch::Receiver<Config>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval =
                Duration::from_millis(config_rx.borrow().monitoring.periodic_save_interval_ms);
            tokio::time::sleep(interval).await;

            if let Err(err) = save_once(&index, &queue, &history, &persist, &config_rx.borrow()).await {
                tracing::error!(error = %err, "periodic state save failed");
            }
        }
    })
}

pub async fn save_once(
    index: &RwLock<IndexStore>,
    queue: &PreprocessedQueue,
    history: &HistoryManager,
    persist: &PersistStore,
    config: &Config,
) -> anyhow::Result<()> {
    let config_hash = crate::config::relevant_config_hash(config);
    let preprocessed = queue.snapshot().await;
    let playback_history = history.playback_tier().await;
    let stats = QueueStats {
        total_videos: index.read().await.total_videos(),
        preprocessed_queue_size: preprocessed.len(),
        persisted_history_size: history.persisted_count().await,
    };
    persist.save(&config_hash, &[], &preprocessed, playback_history, stats)
}
