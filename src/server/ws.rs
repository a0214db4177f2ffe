//! WebSocket observer stream

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;

use crate::fanout::{EventEnvelope, FanoutHub};

use super::routes::AppState;

pub(super) async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let hub = state.service.hub().clone();
    ws.on_upgrade(move |socket| observe(socket, hub))
}

/// Forward every fan-out event to one socket until either side closes
async fn observe(mut socket: WebSocket, hub: FanoutHub) {
    let mut subscription = hub.subscribe();
    tracing::debug!(observers = hub.subscriber_count(), "Observer connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&EventEnvelope::new(&event)) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(bin = %event.bin_id, error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Observers only listen
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(missed = subscription.missed(), "Observer disconnected");
    hub.unsubscribe(subscription);
}
