//! Client-side connections over `tokio-tungstenite`.

use std::sync::Arc;

use super::Connection;
use crate::error::BusError;

/// Opens a WebSocket connection to `url` and attaches it.
///
/// # Errors
///
/// Returns [`BusError::Connect`] if the TCP connection or the WebSocket
/// handshake fails.
pub async fn connect(url: &str) -> Result<Connection, BusError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| BusError::Connect {
            url: url.to_string(),
            source: Arc::new(e),
        })?;

    let connection = Connection::attach(stream);
    tracing::debug!(connection = %connection.id(), url, "client connected");
    Ok(connection)
}
