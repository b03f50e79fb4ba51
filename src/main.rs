use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicI64;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, RwLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use videojukebox_lib::api::events::{LogBroadcastLayer, LogEvent};
use videojukebox_lib::config::{self, ConfigStore, ConfigWatcher};
use videojukebox_lib::history::HistoryManager;
use videojukebox_lib::index::IndexStore;
use videojukebox_lib::init_controller::InitController;
use videojukebox_lib::persist::{self, PersistStore};
use videojukebox_lib::queue::PreprocessedQueue;
use videojukebox_lib::scheduler;
use videojukebox_lib::state::{probe_tool_version, AppState};

const APP_NAME: &str = "videojukebox-server";
/// `/api/queue-status`/monitor "critical floor": below this many
/// ready artifacts the monitor refills immediately rather than waiting
/// for its slower full-target cadence.
const QUEUE_CRITICAL_FLOOR: usize = 5;
const CONSISTENCY_GUARD_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_tx, _log_rx) = broadcast::channel(256);
    init_logging(log_tx.clone());

    tracing::info!("{APP_NAME} starting");

    let cache_dir = resolve_dir("VIDEOJUKEBOX_CACHE_DIR", "./cache");
    let temp_dir = resolve_dir("VIDEOJUKEBOX_TEMP_DIR", "./cache/temp");
    std::fs::create_dir_all(&cache_dir)?;
    std::fs::create_dir_all(&temp_dir)?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| ConfigStore::default_override_path(&cache_dir));
    let config = ConfigStore::load(&config_path);
    tracing::info!(directories = ?config.directories, path = %config_path.display(), "configuration loaded");

    let ffmpeg_status = probe_tool_version(&config.tools.ffmpeg_path);
    let ffprobe_status = probe_tool_version(&config.tools.ffprobe_path);
    if !ffmpeg_status.available {
        tracing::warn!("configured ffmpeg binary is not runnable; transcoding will fail until this is fixed");
    }
    if !ffprobe_status.available {
        tracing::warn!("configured ffprobe binary is not runnable; metadata probing will degrade");
    }

    let (config_tx, config_rx) = watch::channel(config.clone());
    ConfigWatcher::spawn(
        config_path.clone(),
        Duration::from_millis(config.monitoring.config_watch_poll_interval_ms),
        config_tx,
    );

    let index = Arc::new(RwLock::new(IndexStore::new(cache_dir.clone())));
    let queue = Arc::new(PreprocessedQueue::new());
    let history = Arc::new(HistoryManager::new(
        &cache_dir,
        config.video.playback_history_size as usize,
        config.video.persisted_history_size as usize,
    ));
    history.load_from_disk().await;
    let persist = Arc::new(PersistStore::new(&cache_dir));

    // Crash-recovery restore: a prior snapshot whose config hash still
    // matches shortens the initial fill the init controller would otherwise
    // have to do from scratch.
    let config_hash = config::relevant_config_hash(&config);
    if let Some(snapshot) = persist.load(&config_hash) {
        let restored = snapshot.combined_queue.len();
        for artifact in snapshot.combined_queue {
            queue.push(artifact).await;
        }
        tracing::info!(restored, "restored preprocessed queue from prior snapshot");
    }

    let last_index_update_ms = Arc::new(AtomicI64::new(0));
    let (controller, init_rx) = InitController::new();
    let controller = Arc::new(controller);

    let state = Arc::new(AppState::new(
        config_rx.clone(),
        cache_dir.clone(),
        temp_dir.clone(),
        index.clone(),
        queue.clone(),
        history.clone(),
        persist.clone(),
        init_rx,
        log_tx,
        ffmpeg_status,
        ffprobe_status,
        last_index_update_ms.clone(),
    ));

    spawn_initialization(
        controller.clone(),
        index.clone(),
        queue.clone(),
        config.clone(),
        temp_dir.clone(),
        last_index_update_ms.clone(),
    );
    controller.spawn_consistency_guard(CONSISTENCY_GUARD_INTERVAL);

    scheduler::spawn_all(
        index.clone(),
        queue.clone(),
        history.clone(),
        persist.clone(),
        temp_dir.clone(),
        config_rx.clone(),
        last_index_update_ms.clone(),
    );
    queue.clone().start_monitoring(
        index.clone(),
        config_rx.clone(),
        temp_dir.clone(),
        config.video.preprocessed_queue_size as usize,
        QUEUE_CRITICAL_FLOOR,
    );

    let app = videojukebox_lib::api::create_router(state);
    let addr: SocketAddr = format!(
        "{}:{}",
        config.network.server.host, config.network.server.port
    )
    .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown(&index, &queue, &history, &persist, &config_rx, &temp_dir).await;
    Ok(())
}

/// Runs the init controller once in the background, so the HTTP server is
/// already serving `/api/initialization-status` while indexing/filling are
/// still in progress.
fn spawn_initialization(
    controller: Arc<InitController>,
    index: Arc<RwLock<IndexStore>>,
    queue: Arc<PreprocessedQueue>,
    config: config::Config,
    temp_dir: PathBuf,
    last_index_update_ms: Arc<AtomicI64>,
) {
    let target = config.video.preprocessed_queue_size as usize;
    tokio::spawn(async move {
        controller
            .run(&index, &queue, &config, &temp_dir, target, &last_index_update_ms)
            .await;
    });
}

/// Final synchronous persist-then-GC pass before the process exits.
async fn shutdown(
    index: &RwLock<IndexStore>,
    queue: &PreprocessedQueue,
    history: &HistoryManager,
    persist_store: &PersistStore,
    config_rx: &watch::Receiver<config::Config>,
    temp_dir: &std::path::Path,
) {
    tracing::info!("shutting down, persisting final state");
    let config = config_rx.borrow().clone();
    if let Err(err) = scheduler::save_once(index, queue, history, persist_store, &config).await {
        tracing::error!(error = %err, "final state save failed");
        return;
    }

    let config_hash = config::relevant_config_hash(&config);
    let last_snapshot = persist_store.load(&config_hash);
    let queue_processed = queue.processed_paths().await;
    let playback_processed: Vec<String> = history
        .playback_tier()
        .await
        .into_iter()
        .map(|e| e.artifact.processed_path)
        .collect();
    let preserve = persist::build_preserve_set(&queue_processed, &playback_processed, last_snapshot.as_ref());
    let removed = persist::cleanup_temp_dir(temp_dir, &preserve);
    tracing::info!(removed, "final temp cleanup complete, exiting");
}

fn resolve_dir(env_var: &str, default: &str) -> PathBuf {
    std::env::var_os(env_var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn init_logging(log_tx: broadcast::Sender<LogEvent>) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "videojukebox_lib=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(LogBroadcastLayer::new(log_tx))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
