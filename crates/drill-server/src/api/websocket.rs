//! `/ws` event stream.
//!
//! Every [`DrillEvent`] is forwarded as tagged JSON. A heartbeat with queue
//! counts goes out every few seconds, and immediately when the client sends
//! the text frame `stats`.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use super::events::DrillEvent;
use super::state::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

type Sender = SplitSink<WebSocket, Message>;

/// WebSocket upgrade handler: `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state))
}

/// Queue snapshot; counts fall back to zero if storage is unreachable
async fn heartbeat(state: &AppState) -> DrillEvent {
    let manager = state.manager.clone();
    let stats = match tokio::task::spawn_blocking(move || manager.stats()).await {
        Ok(Ok(stats)) => stats,
        Ok(Err(e)) => {
            debug!("Heartbeat stats unavailable: {}", e);
            Default::default()
        }
        Err(e) => {
            debug!("Heartbeat task failed: {}", e);
            Default::default()
        }
    };

    DrillEvent::Heartbeat {
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_items: stats.total_items,
        due_count: stats.due_count,
        active_sessions: stats.active_sessions,
        timestamp: Utc::now(),
    }
}

async fn send_text(sender: &mut Sender, text: String) -> bool {
    sender.send(Message::Text(text.into())).await.is_ok()
}

async fn stream_events(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.subscribe();
    let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
    // First tick fires immediately; the welcome frame covers that moment
    ticker.tick().await;

    let welcome = serde_json::json!({
        "type": "Connected",
        "data": {
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
        }
    });
    if !send_text(&mut sender, welcome.to_string()).await {
        return;
    }
    debug!("Event stream client connected");

    loop {
        let keep_open = tokio::select! {
            received = events.recv() => match received {
                Ok(event) => send_text(&mut sender, event.to_json()).await,
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event stream client lagging, events dropped");
                    true
                }
                Err(RecvError::Closed) => false,
            },
            _ = ticker.tick() => {
                let event = heartbeat(&state).await;
                send_text(&mut sender, event.to_json()).await
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == "stats" => {
                    let event = heartbeat(&state).await;
                    send_text(&mut sender, event.to_json()).await
                }
                Some(Ok(Message::Ping(payload))) => {
                    sender.send(Message::Pong(payload)).await.is_ok()
                }
                Some(Ok(Message::Close(_))) | None => false,
                Some(Ok(_)) => true,
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    false
                }
            },
        };

        if !keep_open {
            break;
        }
    }

    debug!("Event stream client disconnected");
}
