use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::init_controller::InitializationState;
use crate::state::AppState;

/// One ambient server log line mirrored onto the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub level: String,
    pub message: String,
    pub timestamp: i64,
}

/// The enumerated event set pushed to every connected client. Adjacently
/// tagged so the wire shape matches `{type, data}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum OutboundMessage {
    MainLog(LogEvent),
    InitializationUpdate(InitializationState),
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }
}

/// Mirrors every `tracing` event at INFO or above into the broadcast
/// channel as a `main-log` message, so business code never constructs
/// socket messages directly — it just logs.
pub struct LogBroadcastLayer {
    sender: broadcast::Sender<LogEvent>,
}

impl LogBroadcastLayer {
    pub fn new(sender: broadcast::Sender<LogEvent>) -> Self {
        Self { sender }
    }
}

impl<S: Subscriber> Layer<S> for LogBroadcastLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() > Level::INFO {
            return;
        }
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        let _ = self.sender.send(LogEvent {
            level: event.metadata().level().to_string(),
            message: visitor.message,
            timestamp: Utc::now().timestamp_millis(),
        });
    }
}

/// Upgrades to a one-way server-to-client WebSocket. Client messages
/// are ignored entirely; the connection exists purely to push `main-log`
/// and `initialization-update` events.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let initial = OutboundMessage::InitializationUpdate(state.initialization_state());
    if send_message(&mut socket, &initial).await.is_err() {
        return;
    }

    let logs = BroadcastStream::new(state.log_tx.subscribe())
        .filter_map(|item| async move { item.ok() })
        .map(OutboundMessage::MainLog);
    let init_updates =
        WatchStream::new(state.init_rx.clone()).map(OutboundMessage::InitializationUpdate);
    let mut combined = futures_util::stream::select(logs, init_updates);

    while let Some(message) = combined.next().await {
        if send_message(&mut socket, &message).await.is_err() {
            break;
        }
    }
}

async fn send_message(
    socket: &mut WebSocket,
    message: &OutboundMessage,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    socket.send(Message::Text(text.into())).await
}
