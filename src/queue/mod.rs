mod state;

pub use state::PreprocessedQueue;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::index::{get_random_video, IndexStore};
use crate::probe;
use crate::transcode::{self, TranscodeError};

/// Summary of one `fill` pass, surfaced through `/api/detailed-stats`.
#[derive(Debug, Default, Clone)]
pub struct FillReport {
    pub added: usize,
    pub skipped_missing_source: usize,
    pub failed: usize,
}

impl PreprocessedQueue {
    /// Fills the queue up to `target`, excluding originals already queued.
    /// Serialized by the `isProcessing`-flag equivalent: a caller
    /// that observes a fill already in progress returns an empty report
    /// immediately rather than waiting for it to finish.
    pub async fn fill(
        &self,
        target: usize,
        index: &RwLock<IndexStore>,
        config: &Config,
        temp_dir: &Path,
    ) -> FillReport {
        if !self.try_begin_fill().await {
            return FillReport::default();
        }
        let report = self.fill_inner(target, index, config, temp_dir).await;
        self.end_fill().await;
        report
    }

    async fn fill_inner(
        &self,
        target: usize,
        index: &RwLock<IndexStore>,
        config: &Config,
        temp_dir: &Path,
    ) -> FillReport {
        let mut report = FillReport::default();

        loop {
            if self.size().await >= target {
                break;
            }

            let exclude = self.queued_original_paths().await;
            let picked = {
                let guard = index.read().await;
                let mut rng = rand::thread_rng();
                get_random_video(
                    &guard,
                    &config.seasonal_directories,
                    &exclude,
                    chrono::Local::now(),
                    &mut rng,
                )
            };
            let Some(entry) = picked else {
                tracing::debug!("no eligible video left to queue, stopping fill early");
                break;
            };

            if !Path::new(&entry.original_path).exists() {
                tracing::warn!(path = %entry.original_path, "indexed source vanished before transcode, skipping");
                report.skipped_missing_source += 1;
                continue;
            }

            let ffmpeg_path = PathBuf::from(&config.tools.ffmpeg_path);
            let ffprobe_path = PathBuf::from(&config.tools.ffprobe_path);
            let probe_timeout = Duration::from_millis(config.timeouts.probe_timeout_ms);
            let transcode_timeout = Duration::from_millis(config.timeouts.transcode_timeout_ms);
            let config_clone = config.clone();
            let temp_dir_owned = temp_dir.to_path_buf();
            let entry_for_job = entry.clone();

            let join_result = tokio::task::spawn_blocking(move || {
                let metadata = probe::probe_metadata(
                    &ffprobe_path,
                    Path::new(&entry_for_job.original_path),
                    probe_timeout,
                )?
                .unwrap_or_default();
                Ok::<_, anyhow::Error>(transcode::transcode_video(
                    &ffmpeg_path,
                    &entry_for_job,
                    &metadata,
                    &config_clone,
                    &temp_dir_owned,
                    transcode_timeout,
                ))
            })
            .await;

            match join_result {
                Ok(Ok(Ok(artifact))) => {
                    self.push(artifact).await;
                    report.added += 1;
                }
                Ok(Ok(Err(TranscodeError::Io(err)))) => {
                    tracing::warn!(path = %entry.original_path, error = %err, "transcode failed for queue fill");
                    report.failed += 1;
                }
                Ok(Ok(Err(err))) => {
                    tracing::warn!(path = %entry.original_path, error = %err, "transcode rejected source during queue fill");
                    report.failed += 1;
                }
                Ok(Err(err)) => {
                    tracing::warn!(path = %entry.original_path, error = %err, "probe failed during queue fill");
                    report.failed += 1;
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "queue fill worker task panicked");
                    report.failed += 1;
                }
            }
        }

        if report.added > 0 || report.failed > 0 {
            tracing::info!(
                added = report.added,
                failed = report.failed,
                skipped_missing_source = report.skipped_missing_source,
                "queue fill pass complete"
            );
        }
        report
    }

    /// Spawns the periodic monitor: on every
    /// `queueCriticalMonitorInterval` tick it validates the queue and, if
    /// size has dropped below `critical_floor`, refills immediately;
    /// otherwise it refills to `target` on the slower
    /// `queueMonitorInterval` cadence.
    pub fn start_monitoring(
        self: std::sync::Arc<Self>,
        index: std::sync::Arc<RwLock<IndexStore>>,
        config_rx: tokio::sync::watch::Receiver<Config>,
        temp_dir: PathBuf,
        target: usize,
        critical_floor: usize,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut since_last_full_check = Duration::ZERO;
            loop {
                let config = config_rx.borrow().clone();
                let critical_interval =
                    Duration::from_millis(config.monitoring.queue_critical_monitor_interval_ms);
                tokio::time::sleep(critical_interval).await;
                since_last_full_check += critical_interval;

                let removed = self.validate().await;
                if removed > 0 {
                    tracing::info!(removed, "evicted queue entries with missing files during monitor pass");
                }

                let size = self.size().await;
                if size < critical_floor {
                    tracing::warn!(size, critical_floor, "queue below critical floor, refilling immediately");
                    self.fill(target, &index, &config, &temp_dir).await;
                    since_last_full_check = Duration::ZERO;
                    continue;
                }

                let monitor_interval =
                    Duration::from_millis(config.monitoring.queue_monitor_interval_ms);
                if since_last_full_check >= monitor_interval {
                    since_last_full_check = Duration::ZERO;
                    self.fill(target, &index, &config, &temp_dir).await;
                }
            }
        })
    }
}
