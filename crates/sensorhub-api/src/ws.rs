//! `WebSocket` handler for the live reading feed.
//!
//! Clients connect to `GET /ws`. The first frame is `initial-data` with the
//! most recent readings (or an `error` event if they could not be read),
//! followed by one `new-data` frame per ingested reading and one
//! `delete-data` frame per bulk delete. Every frame is a JSON-encoded
//! [`LiveEvent`].
//!
//! A client that falls too far behind either skips ahead or, under the
//! `disconnect` overflow policy, gets a close frame. The subscription is
//! dropped, and so unregistered, as soon as the handler returns.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use sensorhub_core::Subscription;
use sensorhub_types::LiveEvent;
use tracing::{debug, warn};

use crate::state::AppState;

/// Message sent to a client whose connect-time snapshot failed.
const SNAPSHOT_FAILED: &str = "Failed to fetch initial data";

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming live events.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_live(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize and send one event. Returns `false` once the client is gone.
async fn send_event(socket: &mut WebSocket, event: &LiveEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            warn!(event = event.name(), "Failed to serialize live event: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let (mut subscription, snapshot) = state.live.subscribe().await;
    debug!(subscriber = %subscription.id(), "WebSocket client connected");

    let first = match snapshot {
        Ok(readings) => LiveEvent::InitialData(readings),
        Err(_) => LiveEvent::Error {
            message: SNAPSHOT_FAILED.to_owned(),
        },
    };
    if !send_event(&mut socket, &first).await {
        debug!(subscriber = %subscription.id(), "WebSocket client disconnected (send failed)");
        return;
    }

    stream_events(&mut socket, &mut subscription).await;
}

/// Forward live events until either side closes.
async fn stream_events(socket: &mut WebSocket, subscription: &mut Subscription) {
    let id = subscription.id();

    loop {
        tokio::select! {
            // Next live event for this subscriber.
            event = subscription.recv() => {
                let Some(event) = event else {
                    if subscription.was_overflowed() {
                        warn!(subscriber = %id, "Closing WebSocket, client fell too far behind");
                        let _ = socket.send(Message::Close(None)).await;
                    } else {
                        debug!(subscriber = %id, "Subscription closed, shutting down WebSocket");
                    }
                    return;
                };

                let lagged = subscription.take_lagged();
                if lagged > 0 {
                    debug!(subscriber = %id, skipped = lagged, "WebSocket client lagged, skipping ahead");
                }

                if !send_event(socket, &event).await {
                    debug!(subscriber = %id, "WebSocket client disconnected (send failed)");
                    return;
                }
            }
            // Close frames, pings, and disconnects from the client.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(subscriber = %id, "WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(subscriber = %id, "WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(subscriber = %id, "WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
