//! # dashboard-bus
//!
//! WebSocket message-bus helpers: start a server, broadcast a message to a
//! set of connections, and correlate a sent message with the reply that
//! carries the same identifier.
//!
//! ## Architecture
//!
//! ```text
//! Callers
//!     │
//!     ├── bus::broadcast_and_disregard     (fire-and-forget)
//!     ├── bus::send_and_await              (one connection, one reply)
//!     ├── bus::broadcast_and_await_first   (first reply wins)
//!     │
//!     ├── codec   (JSON ⇄ base64 frames)
//!     │
//!     ├── transport::Connection            (send + message/error/close)
//!     │       ├── server  (axum upgrade route)
//!     │       ├── client  (tokio-tungstenite)
//!     │       └── memory  (in-process peer)
//!     │
//!     └── server::start_websocket_server
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use dashboard_bus::bus::send_and_await;
//! use dashboard_bus::codec::Message;
//! use dashboard_bus::transport::connect;
//!
//! # async fn run() -> Result<(), dashboard_bus::error::BusError> {
//! let connection = connect("ws://127.0.0.1:24012/").await?;
//! let reply = send_and_await(&connection, &Message::new(1_i64, serde_json::json!("ping"))).await?;
//! println!("{}", reply.payload);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod codec;
pub mod config;
pub mod error;
pub mod server;
pub mod transport;
