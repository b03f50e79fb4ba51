use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch, RwLock};

use crate::api::events::LogEvent;
use crate::config::Config;
use crate::history::HistoryManager;
use crate::index::IndexStore;
use crate::init_controller::InitializationState;
use crate::persist::PersistStore;
use crate::queue::PreprocessedQueue;

/// Whether a configured external tool binary is runnable, probed once at
/// startup. An unavailable prober degrades metadata probing rather than
/// aborting startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalToolStatus {
    pub available: bool,
    pub version: Option<String>,
}

/// Runs `<tool_path> -version` and takes its first output line as a
/// version string. Any spawn failure yields `{available: false}`.
pub fn probe_tool_version(tool_path: &str) -> ExternalToolStatus {
    match std::process::Command::new(tool_path).arg("--version").output() {
        Ok(output) => {
            let text = if !output.stdout.is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                String::from_utf8_lossy(&output.stderr).into_owned()
            };
            let version = text.lines().next().map(|line| line.trim().to_string());
            ExternalToolStatus {
                available: version.is_some(),
                version,
            }
        }
        Err(err) => {
            tracing::warn!(tool = %tool_path, error = %err, "external tool is not runnable");
            ExternalToolStatus::default()
        }
    }
}

/// Session-scoped counters surfaced through `/api/detailed-stats`.
#[derive(Default)]
pub struct SessionStats {
    videos_played: AtomicU64,
    video_errors: AtomicU64,
    manual_skips: AtomicU64,
    returns_to_previous: AtomicU64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatsSnapshot {
    pub videos_played: u64,
    pub video_errors: u64,
    pub manual_skips: u64,
    pub returns_to_previous: u64,
}

impl SessionStats {
    pub fn record_video_played(&self) {
        self.videos_played.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_video_error(&self) {
        self.video_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manual_skip(&self) {
        self.manual_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_return_to_previous(&self) {
        self.returns_to_previous.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            videos_played: self.videos_played.load(Ordering::Relaxed),
            video_errors: self.video_errors.load(Ordering::Relaxed),
            manual_skips: self.manual_skips.load(Ordering::Relaxed),
            returns_to_previous: self.returns_to_previous.load(Ordering::Relaxed),
        }
    }
}

/// The root context assembled explicitly in `main` and shared across every
/// HTTP handler and background task; no ambient globals.
pub struct AppState {
    pub(crate) config_rx: watch::Receiver<Config>,
    pub(crate) cache_dir: PathBuf,
    pub(crate) temp_dir: PathBuf,
    pub(crate) index: Arc<RwLock<IndexStore>>,
    pub(crate) queue: Arc<PreprocessedQueue>,
    pub(crate) history: Arc<HistoryManager>,
    pub(crate) persist: Arc<PersistStore>,
    pub(crate) init_rx: watch::Receiver<InitializationState>,
    pub(crate) log_tx: broadcast::Sender<LogEvent>,
    pub(crate) stats: SessionStats,
    pub(crate) ffmpeg_status: ExternalToolStatus,
    pub(crate) ffprobe_status: ExternalToolStatus,
    pub(crate) last_index_update_ms: Arc<AtomicI64>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config_rx: watch::Receiver<Config>,
        cache_dir: PathBuf,
        temp_dir: PathBuf,
        index: Arc<RwLock<IndexStore>>,
        queue: Arc<PreprocessedQueue>,
        history: Arc<HistoryManager>,
        persist: Arc<PersistStore>,
        init_rx: watch::Receiver<InitializationState>,
        log_tx: broadcast::Sender<LogEvent>,
        ffmpeg_status: ExternalToolStatus,
        ffprobe_status: ExternalToolStatus,
        last_index_update_ms: Arc<AtomicI64>,
    ) -> Self {
        Self {
            config_rx,
            cache_dir,
            temp_dir,
            index,
            queue,
            history,
            persist,
            init_rx,
            log_tx,
            stats: SessionStats::default(),
            ffmpeg_status,
            ffprobe_status,
            last_index_update_ms,
        }
    }

    pub fn config(&self) -> Config {
        self.config_rx.borrow().clone()
    }

    pub fn initialization_state(&self) -> InitializationState {
        self.init_rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrunnable_tool_path_is_reported_unavailable() {
        let status = probe_tool_version("/definitely/not/a/real/binary");
        assert!(!status.available);
        assert!(status.version.is_none());
    }

    #[test]
    fn session_stats_snapshot_reflects_increments() {
        let stats = SessionStats::default();
        stats.record_video_played();
        stats.record_video_played();
        stats.record_video_error();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.videos_played, 2);
        assert_eq!(snapshot.video_errors, 1);
        assert_eq!(snapshot.manual_skips, 0);
    }
}
