//! Server bootstrap.
//!
//! [`start_websocket_server`] binds a listener, mounts the WebSocket upgrade
//! route and returns once the socket is accepting connections. Accepted
//! sockets are delivered as [`Connection`]s through
//! [`WebSocketServer::accept`].
//!
//! Events on a connection that arrive before the caller registers a
//! listener on it are not replayed.

mod handler;

use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::error::BusError;
use crate::transport::Connection;
use handler::{UpgradeState, ws_handler};

/// Transport-level server options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind. Port `0` picks a free port.
    pub listen_addr: SocketAddr,
    /// Route on which WebSocket upgrades are accepted.
    pub path: String,
    /// Maximum message size accepted from a peer.
    pub max_message_size: Option<usize>,
    /// Maximum frame size accepted from a peer.
    pub max_frame_size: Option<usize>,
}

impl ServerConfig {
    /// Creates a configuration listening on `listen_addr` at `/`.
    #[must_use]
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            path: "/".to_string(),
            max_message_size: None,
            max_frame_size: None,
        }
    }

    /// Sets the upgrade route. A missing leading `/` is added.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(path.into());
        self
    }

    /// Sets the maximum accepted message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = Some(size);
        self
    }

    /// Sets the maximum accepted frame size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = Some(size);
        self
    }
}

fn normalize_path(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

/// A running WebSocket server.
///
/// Dropping the handle stops accepting new connections; connections already
/// handed out stay open.
#[derive(Debug)]
pub struct WebSocketServer {
    local_addr: SocketAddr,
    path: String,
    accepted: mpsc::UnboundedReceiver<Connection>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

/// Binds and starts a WebSocket server, returning once it accepts
/// connections.
///
/// # Errors
///
/// Returns [`BusError::Bind`] if the listener cannot be bound. No retry is
/// attempted.
pub async fn start_websocket_server(config: ServerConfig) -> Result<WebSocketServer, BusError> {
    let addr = config.listen_addr;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| BusError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| BusError::Bind { addr, source })?;

    let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
    let state = UpgradeState {
        accepted: accepted_tx,
        max_message_size: config.max_message_size,
        max_frame_size: config.max_frame_size,
    };

    let path = normalize_path(config.path);
    let app = Router::new()
        .route(&path, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            tracing::error!(addr = %local_addr, error = %e, "websocket server stopped");
        }
    });

    tracing::info!(addr = %local_addr, %path, "websocket server listening");

    Ok(WebSocketServer {
        local_addr,
        path,
        accepted: accepted_rx,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

impl WebSocketServer {
    /// Returns the bound address (with the real port when `0` was requested).
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the `ws://` URL clients should connect to.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.path)
    }

    /// Waits for the next accepted connection.
    ///
    /// Returns `None` once the server has stopped.
    pub async fn accept(&mut self) -> Option<Connection> {
        self.accepted.recv().await
    }

    /// Stops accepting connections and waits for the listener to shut down.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(addr = %self.local_addr, error = %e, "server task failed");
        }
        tracing::info!(addr = %self.local_addr, "websocket server shut down");
    }
}

impl Drop for WebSocketServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
