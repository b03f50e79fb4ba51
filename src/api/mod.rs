pub mod events;
mod handlers;
mod stream;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub use handlers::ArtifactResponse;

/// Builds the full axum router for the boundary API: the JSON/REST
/// surface, the byte-range `/videos` stream, and the one-way WebSocket.
/// CORS is permissive on purpose — the client is an arbitrary
/// browser/TV/desktop shell, never a same-origin single-page app.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::RANGE, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/config", get(handlers::get_config))
        .route(
            "/api/initialization-status",
            get(handlers::initialization_status),
        )
        .route("/api/queue-status", get(handlers::queue_status))
        .route("/api/detailed-stats", get(handlers::detailed_stats))
        .route("/api/next-video", get(handlers::next_video))
        .route("/api/previous-video", get(handlers::previous_video))
        .route("/api/video-ended", post(handlers::video_ended))
        .route(
            "/api/add-to-history",
            post(handlers::add_to_history_handler),
        )
        .route("/api/video-error", post(handlers::video_error))
        .route(
            "/api/video-skipped-manual",
            post(handlers::video_skipped_manual),
        )
        .route(
            "/api/video-returned-to-previous",
            post(handlers::video_returned_to_previous),
        )
        .route(
            "/api/ensure-video-processed",
            post(handlers::ensure_video_processed),
        )
        .route("/videos", get(stream::serve_video))
        .route("/", get(events::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    async fn test_state() -> Arc<AppState> {
        let cache_dir = std::env::temp_dir().join(format!("videojukebox-test-cache-{}", uuid::Uuid::new_v4()));
        let temp_dir = std::env::temp_dir().join(format!("videojukebox-test-artifacts-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::create_dir_all(&temp_dir).unwrap();
        let (_config_tx, config_rx) = tokio::sync::watch::channel(crate::config::Config::default());
        let (_controller, init_rx) = crate::init_controller::InitController::new();
        let (log_tx, _log_rx) = tokio::sync::broadcast::channel(16);

        Arc::new(AppState::new(
            config_rx,
            cache_dir.clone(),
            temp_dir,
            Arc::new(tokio::sync::RwLock::new(crate::index::IndexStore::new(cache_dir.clone()))),
            Arc::new(crate::queue::PreprocessedQueue::new()),
            Arc::new(crate::history::HistoryManager::new(&cache_dir, 10, 5000)),
            Arc::new(crate::persist::PersistStore::new(&cache_dir)),
            init_rx,
            log_tx,
            crate::state::ExternalToolStatus::default(),
            crate::state::ExternalToolStatus::default(),
            Arc::new(std::sync::atomic::AtomicI64::new(0)),
        ))
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn next_video_on_empty_queue_returns_404() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/next-video")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn previous_video_on_empty_history_returns_null_body() {
        let app = create_router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/previous-video")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"null");
    }
}
