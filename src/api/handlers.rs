use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::history::HistoryEntry;
use crate::queue::FillReport;
use crate::reprocess;
use crate::state::{AppState, SessionStatsSnapshot};
use crate::transcode::ProcessedArtifact;

/// A `ProcessedArtifact` decorated with the playable `/videos` URL.
/// Every handler that ships an artifact to a client wraps it in this
/// before serializing, so clients never have to construct the URL
/// themselves from `processedPath`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    #[serde(flatten)]
    pub artifact: ProcessedArtifact,
    pub server_url: String,
}

fn server_url(processed_path: &str) -> String {
    let basename = std::path::Path::new(processed_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(processed_path);
    format!("/videos?filename={}", urlencoding::encode(basename))
}

fn decorate(artifact: ProcessedArtifact) -> ArtifactResponse {
    let server_url = server_url(&artifact.processed_path);
    ArtifactResponse { artifact, server_url }
}

/// `GET /health` — liveness only, no state lookup.
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/config` — the full merged, normalized config.
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<crate::config::Config> {
    Json(state.config())
}

/// `GET /api/initialization-status`.
pub async fn initialization_status(
    State(state): State<Arc<AppState>>,
) -> Json<crate::init_controller::InitializationState> {
    Json(state.initialization_state())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessedQueueStatus {
    pub current: usize,
    pub target: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusResponse {
    pub preprocessed_queue: PreprocessedQueueStatus,
    pub is_preprocessing: bool,
    pub total_videos: usize,
    pub initialization_state: crate::init_controller::InitializationState,
}

/// `GET /api/queue-status`.
pub async fn queue_status(State(state): State<Arc<AppState>>) -> Json<QueueStatusResponse> {
    let config = state.config();
    let current = state.queue.size().await;
    let is_preprocessing = state.queue.is_processing().await;
    let total_videos = state.index.read().await.total_videos();

    Json(QueueStatusResponse {
        preprocessed_queue: PreprocessedQueueStatus {
            current,
            target: config.video.preprocessed_queue_size as usize,
        },
        is_preprocessing,
        total_videos,
        initialization_state: state.initialization_state(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatsResponse {
    pub total_videos: usize,
    pub preprocessed_queue_size: usize,
    pub playback_history_size: usize,
    pub persisted_history_size: usize,
    pub session: SessionStatsSnapshot,
    pub next_update_eta_ms: i64,
    pub ffmpeg_available: bool,
    pub ffprobe_available: bool,
}

/// `GET /api/detailed-stats`: extended stats plus an ETA, in
/// milliseconds, until the next scheduled index refresh. A
/// negative ETA means the refresh is already overdue (e.g. the server has
/// been asleep past its own interval).
pub async fn detailed_stats(State(state): State<Arc<AppState>>) -> Json<DetailedStatsResponse> {
    let config = state.config();
    let total_videos = state.index.read().await.total_videos();
    let preprocessed_queue_size = state.queue.size().await;
    let playback_history_size = state.history.playback_tier().await.len();
    let persisted_history_size = state.history.persisted_count().await;

    let last_update = state.last_index_update_ms.load(Ordering::Relaxed);
    let next_update_eta_ms = if last_update == 0 {
        0
    } else {
        let now = now_ms();
        last_update + config.video.update_interval_ms as i64 - now
    };

    Json(DetailedStatsResponse {
        total_videos,
        preprocessed_queue_size,
        playback_history_size,
        persisted_history_size,
        session: state.stats.snapshot(),
        next_update_eta_ms,
        ffmpeg_available: state.ffmpeg_status.available,
        ffprobe_available: state.ffprobe_status.available,
    })
}

/// Spawns a background fill if the queue has dropped below target, without
/// making the caller wait for it — refill is triggered by enqueueing work,
/// not by blocking the caller.
fn spawn_refill_if_below_target(state: &Arc<AppState>) {
    let state = state.clone();
    tokio::spawn(async move {
        let config = state.config();
        let target = config.video.preprocessed_queue_size as usize;
        if state.queue.size().await < target {
            let report: FillReport = state
                .queue
                .fill(target, &state.index, &config, &state.temp_dir)
                .await;
            if report.added > 0 || report.failed > 0 {
                tracing::debug!(added = report.added, failed = report.failed, "background refill after next-video pop");
            }
        }
    });
}

const NEXT_VIDEO_MAX_ATTEMPTS: usize = 5;

/// `GET /api/next-video`: pops the next artifact from the
/// preprocessed queue. `PreprocessedQueue::get_next` already retries
/// internally against entries whose file vanished, but a single call can
/// still come back `None` after burning its own retry budget while
/// artifacts remain elsewhere in the queue. This handler makes its own
/// bounded attempt budget on top of that, re-calling `get_next` against
/// the queue's current state up to 5 times before giving up; only then
/// do we schedule an immediate refill and answer 404.
pub async fn next_video(State(state): State<Arc<AppState>>) -> Result<Json<ArtifactResponse>> {
    for _ in 0..NEXT_VIDEO_MAX_ATTEMPTS {
        if let Some(artifact) = state.queue.get_next().await {
            state.stats.record_video_played();
            spawn_refill_if_below_target(&state);
            return Ok(Json(decorate(artifact)));
        }
        if state.queue.size().await == 0 {
            break;
        }
    }

    let state_for_refill = state.clone();
    tokio::spawn(async move {
        let config = state_for_refill.config();
        let target = config.video.preprocessed_queue_size as usize;
        state_for_refill
            .queue
            .fill(target, &state_for_refill.index, &config, &state_for_refill.temp_dir)
            .await;
    });
    Err(ServerError::NotFound("no video currently available".to_string()))
}

/// `GET /api/previous-video`: `null` body, not 404, when there
/// is nothing to go back to — this is a normal "no previous" state, not
/// an error condition.
pub async fn previous_video(
    State(state): State<Arc<AppState>>,
) -> Json<Option<ArtifactResponse>> {
    let previous = state.history.get_previous_video().await;
    Json(previous.map(|entry: HistoryEntry| decorate(entry.artifact)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBody {
    #[serde(flatten)]
    pub artifact: ProcessedArtifact,
    #[serde(default)]
    pub from_history: bool,
}

/// Shared body for `/api/video-ended` and `/api/add-to-history` — both add
/// the played artifact to history the same way.
async fn add_to_history(state: &Arc<AppState>, body: HistoryBody) {
    state
        .history
        .add_to_history(body.artifact, body.from_history)
        .await;
}

/// `POST /api/video-ended`.
pub async fn video_ended(State(state): State<Arc<AppState>>, Json(body): Json<HistoryBody>) {
    add_to_history(&state, body).await;
}

/// `POST /api/add-to-history`.
pub async fn add_to_history_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HistoryBody>,
) {
    add_to_history(&state, body).await;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoErrorBody {
    #[serde(default)]
    pub error_message: Option<String>,
}

/// `POST /api/video-error`.
pub async fn video_error(State(state): State<Arc<AppState>>, Json(body): Json<VideoErrorBody>) {
    state.stats.record_video_error();
    tracing::warn!(error = ?body.error_message, "client reported a video playback error");
}

/// `POST /api/video-skipped-manual`.
pub async fn video_skipped_manual(State(state): State<Arc<AppState>>) {
    state.stats.record_manual_skip();
}

/// `POST /api/video-returned-to-previous`.
pub async fn video_returned_to_previous(State(state): State<Arc<AppState>>) {
    state.stats.record_return_to_previous();
}

/// `POST /api/ensure-video-processed`: re-transcodes the
/// submitted artifact if its processed file is missing. Synchronous
/// probe/transcode work runs on a blocking thread so it never stalls the
/// async runtime.
pub async fn ensure_video_processed(
    State(state): State<Arc<AppState>>,
    Json(artifact): Json<ProcessedArtifact>,
) -> Result<Json<Option<ArtifactResponse>>> {
    let config = state.config();
    let temp_dir = state.temp_dir.clone();
    let probe_timeout = Duration::from_millis(config.timeouts.probe_timeout_ms);
    let transcode_timeout = Duration::from_millis(config.timeouts.transcode_timeout_ms);
    let ffmpeg_path = std::path::PathBuf::from(&config.tools.ffmpeg_path);
    let ffprobe_path = std::path::PathBuf::from(&config.tools.ffprobe_path);

    let result = tokio::task::spawn_blocking(move || {
        reprocess::ensure_processed(
            artifact,
            &ffmpeg_path,
            &ffprobe_path,
            &config,
            &temp_dir,
            probe_timeout,
            transcode_timeout,
        )
    })
    .await
    .map_err(|err| ServerError::Internal(anyhow::anyhow!("reprocess task panicked: {err}")))?;

    match result {
        Ok(artifact) => Ok(Json(Some(decorate(artifact)))),
        Err(reprocess::ReprocessError::OriginalMissing(path)) => {
            tracing::warn!(path = %path, "ensure-video-processed: original source missing");
            Ok(Json(None))
        }
        Err(err) => Err(ServerError::Internal(anyhow::anyhow!(err))),
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_url_encodes_basename_only() {
        let url = server_url("/tmp/processed_abc def.mp4");
        assert_eq!(url, "/videos?filename=processed_abc%20def.mp4");
    }
}
