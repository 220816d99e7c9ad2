use std::sync::Arc;
use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::AppState;
use crate::ws::BroadcastCoordinator;

/// WebSocket handler for the live update channel
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Response {
    info!("New WebSocket connection attempt");
    let coordinator = state.coordinator.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, coordinator: Arc<BroadcastCoordinator>) {

    // Generate unique connection ID to identify this client
    let connection_id = Uuid::new_v4();
    info!("WebSocket connection established with connection_id: {}", connection_id);

    let (mut sender, mut receiver) = socket.split();

    // The coordinator pushes frames into this queue; only the writer task touches the socket sink
    let (outbound, mut queue) = mpsc::channel::<Arc<str>>(coordinator.queue_capacity());
    coordinator.register(connection_id, outbound).await;

    // Forward queued frames to the client. Ends when the coordinator drops the
    // queue or the socket refuses a write.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                break;
            }
        }
        let _ = sender.close().await;
    });

    // Clients only listen; incoming frames are logged and otherwise ignored
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    debug!("Received from WebSocket client {}: {}", connection_id, text);
                }
                Message::Close(_) => {
                    debug!("WebSocket client {} sent close frame", connection_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish (and finish the other)
    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    coordinator.unregister(connection_id).await;
    info!("WebSocket connection {} terminated", connection_id);
}
