use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use cuebus_core::config::MAX_PAYLOAD_BYTES;
use cuebus_protocol::{frames::EventFrame, methods};
use cuebus_scheduler::{StateSnapshot, TimersSnapshot};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::{message, send};

/// Feeds this connection has subscribed to. `None` means not subscribed;
/// dropping a receiver unsubscribes it from the engine.
#[derive(Default)]
pub struct Subscriptions {
    pub state: Option<watch::Receiver<Arc<StateSnapshot>>>,
    pub timers: Option<watch::Receiver<Arc<TimersSnapshot>>>,
}

/// Axum handler — upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop — lives for the entire WS session.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");
    state.ws_clients.insert(conn_id.clone(), chrono::Utc::now());

    let (mut tx, mut rx) = socket.split();
    let mut subs = Subscriptions::default();

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id, size = text.len(), "payload too large");
                            break;
                        }
                        if !message::handle(&conn_id, &text, &mut subs, &mut tx, &state).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = tx.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }

            snapshot = next_value(&mut subs.state) => {
                let Some(snapshot) = snapshot else {
                    subs.state = None;
                    continue;
                };
                let ev = EventFrame::new(methods::EVENT_STATE, &*snapshot).with_seq(state.next_seq());
                if send::frame(&mut tx, ev).await.is_err() {
                    break;
                }
            }

            timers = next_value(&mut subs.timers) => {
                let Some(timers) = timers else {
                    subs.timers = None;
                    continue;
                };
                let ev = EventFrame::new(methods::EVENT_TIMERS, &*timers).with_seq(state.next_seq());
                if send::frame(&mut tx, ev).await.is_err() {
                    break;
                }
                debug!(conn_id, "timers pushed");
            }
        }
    }

    state.ws_clients.remove(&conn_id);
    info!(conn_id, "WS connection closed");
}

/// Wait for the next value on an optional feed. Never resolves when the
/// connection is not subscribed; yields `None` once the feed is closed.
async fn next_value<T>(rx: &mut Option<watch::Receiver<Arc<T>>>) -> Option<Arc<T>> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
