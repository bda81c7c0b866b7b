//! `WebSocket` handler for real-time commit streaming.
//!
//! Clients connect to `GET /ws/commits` and receive a JSON-encoded
//! [`CommitBroadcast`] each time a command is committed. All clients
//! share one [`broadcast`](tokio::sync::broadcast) channel; a client that
//! falls behind skips to the newest notice.
//!
//! [`CommitBroadcast`]: crate::state::CommitBroadcast

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::{AppState, SharedLog};

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming commit notices.
///
/// # Route
///
/// `GET /ws/commits`
pub async fn ws_commits<L: SharedLog>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<L>>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws<L: SharedLog>(mut socket: WebSocket, state: Arc<AppState<L>>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(notice) => {
                        let json = match serde_json::to_string(&notice) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize commit broadcast: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    // Commands go through the REST API.
                    _ => {}
                }
            }
        }
    }
}
