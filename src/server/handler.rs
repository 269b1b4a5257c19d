//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use tokio::sync::mpsc;

use crate::transport::Connection;

/// State shared with the upgrade handler.
#[derive(Debug, Clone)]
pub(crate) struct UpgradeState {
    /// Accepted connections are handed to the server handle through here.
    pub accepted: mpsc::UnboundedSender<Connection>,
    /// Maximum message size accepted from a peer.
    pub max_message_size: Option<usize>,
    /// Maximum frame size accepted from a peer.
    pub max_frame_size: Option<usize>,
}

/// `GET <path>` — Upgrade the HTTP connection and attach the socket.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<UpgradeState>,
) -> impl IntoResponse {
    let mut ws = ws;
    if let Some(size) = state.max_message_size {
        ws = ws.max_message_size(size);
    }
    if let Some(size) = state.max_frame_size {
        ws = ws.max_frame_size(size);
    }

    ws.on_upgrade(move |socket| async move {
        let connection = Connection::attach(socket);
        tracing::info!(connection = %connection.id(), "websocket connection accepted");
        if state.accepted.send(connection.clone()).is_err() {
            tracing::debug!(connection = %connection.id(), "server handle dropped, closing");
            let _ = connection.close(1001, "server shutting down");
        }
    })
}
