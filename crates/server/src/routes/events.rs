use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::Deployment;

/// GET /api/events/ws
/// Upgrade to a WebSocket and stream hub events as JSON frames.
pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(deployment): State<Deployment>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, deployment))
}

async fn handle_socket(socket: WebSocket, deployment: Deployment) {
    let mut handle = deployment.events().connect();
    debug!(client_id = handle.id(), "Event stream client connected");

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            event = handle.recv() => match event {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(client_id = handle.id(), skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ignore pings and client chatter
                Some(Err(_)) => break,
            },
        }
    }

    debug!(client_id = handle.id(), "Event stream client disconnected");
    deployment.events().disconnect(handle);
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new().route("/events/ws", get(events_ws))
}
