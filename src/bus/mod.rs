//! Messaging helpers over [`crate::transport::Connection`]s.
//!
//! - [`broadcast_and_disregard`]: send one message to many connections.
//! - [`send_and_await`]: send on one connection, wait for the reply with
//!   the same id.
//! - [`broadcast_and_await_first`]: race [`send_and_await`] across many
//!   connections and keep the first reply.

pub mod broadcast;
pub mod exchange;
pub mod first;

pub use broadcast::{BroadcastReport, broadcast_and_disregard};
pub use exchange::{ExchangeState, PendingExchange, send_and_await};
pub use first::broadcast_and_await_first;
