//! Transport layer: connection handles over WebSocket libraries.
//!
//! A [`Connection`] exposes "send a text frame" and delivers
//! `message`, `error` and `close` notifications to any number of
//! [`Listener`]s. Server sockets come from [`crate::server`], client
//! sockets from [`connect`], and in-process pairs from [`memory::pair`].

pub mod client;
pub mod connection;
pub mod connection_id;
pub mod listeners;
pub mod memory;
pub mod wire;

pub use client::connect;
pub use connection::{ABNORMAL_CLOSURE, Connection, NO_STATUS_RECEIVED, OutboundFrame};
pub use connection_id::ConnectionId;
pub use listeners::{Listener, ListenerRegistry, SocketEvent};
pub use memory::MemoryPeer;
pub use wire::{Inbound, WireMessage};
