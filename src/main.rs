//! dashboard-bus relay entry point.
//!
//! Starts the WebSocket server and relays every message received on one
//! connection to all other connected peers.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing_subscriber::EnvFilter;

use dashboard_bus::bus::broadcast_and_disregard;
use dashboard_bus::codec;
use dashboard_bus::config::BusConfig;
use dashboard_bus::server::start_websocket_server;
use dashboard_bus::transport::{Connection, ConnectionId, SocketEvent};

type Peers = Arc<RwLock<HashMap<ConnectionId, Connection>>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = BusConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(addr = %config.listen_addr, "starting dashboard-bus relay");

    // Start server
    let mut server = start_websocket_server(config.server_config()).await?;
    let peers: Peers = Arc::default();

    loop {
        tokio::select! {
            accepted = server.accept() => {
                let Some(connection) = accepted else { break };
                tokio::spawn(relay(connection, Arc::clone(&peers)));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    server.shutdown().await;
    Ok(())
}

/// Forwards every message from `connection` to all other peers until it
/// closes.
async fn relay(connection: Connection, peers: Peers) {
    let id = connection.id();
    let mut listener = connection.listen();
    peers.write().await.insert(id, connection);

    while let Some(event) = listener.recv().await {
        match event {
            SocketEvent::Message(frame) => {
                let message = match codec::decode(&frame) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!(connection = %id, error = %e, "dropping undecodable frame");
                        continue;
                    }
                };
                let others: Vec<Connection> = peers
                    .read()
                    .await
                    .iter()
                    .filter(|(peer_id, _)| **peer_id != id)
                    .map(|(_, peer)| peer.clone())
                    .collect();
                if let Err(e) = broadcast_and_disregard(&others, &message) {
                    tracing::warn!(connection = %id, error = %e, "relay failed");
                }
            }
            SocketEvent::Error(e) => {
                tracing::warn!(connection = %id, error = %e, "connection error");
            }
            SocketEvent::Close { code, reason } => {
                tracing::info!(connection = %id, code, %reason, "peer disconnected");
                break;
            }
        }
    }

    listener.deregister();
    peers.write().await.remove(&id);
}
