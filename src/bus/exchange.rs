//! Correlated request/response exchange.
//!
//! A [`PendingExchange`] is the state of one sent message waiting for its
//! reply on one connection. It registers a listener before sending, then
//! consumes socket events until one of them settles it:
//!
//! - a frame whose decoded `id` equals the sent `id` resolves it,
//! - an error event fails it with [`BusError::Transport`],
//! - a close event fails it with [`BusError::ConnectionClosed`].
//!
//! Frames with another `id`, or frames that do not decode, are left for
//! whichever exchange they belong to. Settlement always deregisters the
//! listener first and happens at most once.

use crate::codec::{self, Message, MessageId};
use crate::error::BusError;
use crate::transport::{ABNORMAL_CLOSURE, Connection, ConnectionId, Listener, SocketEvent};

/// Lifecycle of an exchange: `Sent` until exactly one settling event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeState {
    /// The message was sent and no settling event has arrived yet.
    Sent,
    /// A matching reply arrived.
    Resolved,
    /// The connection errored or closed first.
    Failed,
}

/// One sent message awaiting its reply.
///
/// Dropping a pending exchange deregisters its listener, so wrapping
/// [`PendingExchange::wait`] in a timeout leaves nothing behind.
#[derive(Debug)]
pub struct PendingExchange {
    connection: ConnectionId,
    id: MessageId,
    listener: Listener,
    state: ExchangeState,
}

impl PendingExchange {
    /// Registers a listener on `connection`, then sends the already encoded
    /// `frame` carrying message `id`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the frame cannot be queued; the
    /// listener is removed before returning.
    pub fn start(connection: &Connection, id: MessageId, frame: String) -> Result<Self, BusError> {
        let mut listener = connection.listen();
        if let Err(e) = connection.send_text(frame) {
            listener.deregister();
            return Err(e);
        }

        tracing::trace!(connection = %connection.id(), %id, "exchange sent");
        Ok(Self {
            connection: connection.id(),
            id,
            listener,
            state: ExchangeState::Sent,
        })
    }

    /// Returns the identifier this exchange waits for.
    #[must_use]
    pub const fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> ExchangeState {
        self.state
    }

    /// Waits for the exchange to settle.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] on a socket error and
    /// [`BusError::ConnectionClosed`] if the socket closes first.
    pub async fn wait(mut self) -> Result<Message, BusError> {
        while let Some(event) = self.listener.recv().await {
            if let Some(outcome) = self.on_event(event) {
                return outcome;
            }
        }

        // The event source went away without a close event.
        let closed = BusError::ConnectionClosed {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        };
        self.listener.deregister();
        self.state = ExchangeState::Failed;
        Err(closed)
    }

    /// Applies one socket event. Returns the outcome if the event settles
    /// the exchange.
    fn on_event(&mut self, event: SocketEvent) -> Option<Result<Message, BusError>> {
        match event {
            SocketEvent::Message(frame) => match codec::decode(&frame) {
                Ok(reply) if reply.id == self.id => self.settle(Ok(reply)),
                Ok(other) => {
                    tracing::trace!(
                        connection = %self.connection,
                        expected = %self.id,
                        received = %other.id,
                        "ignoring reply for another exchange"
                    );
                    None
                }
                Err(e) => {
                    tracing::debug!(connection = %self.connection, error = %e, "ignoring undecodable frame");
                    None
                }
            },
            SocketEvent::Error(fault) => self.settle(Err(BusError::Transport(fault))),
            SocketEvent::Close { code, reason } => {
                self.settle(Err(BusError::ConnectionClosed { code, reason }))
            }
        }
    }

    /// Deregisters the listener, then records the outcome if the exchange
    /// is still `Sent`. Returns `None` when already settled.
    fn settle(&mut self, outcome: Result<Message, BusError>) -> Option<Result<Message, BusError>> {
        self.listener.deregister();
        if self.state != ExchangeState::Sent {
            return None;
        }

        self.state = if outcome.is_ok() {
            ExchangeState::Resolved
        } else {
            ExchangeState::Failed
        };
        tracing::debug!(connection = %self.connection, id = %self.id, state = ?self.state, "exchange settled");
        Some(outcome)
    }
}

/// Sends `message` on `connection` and waits for the reply with the same id.
///
/// There is no timeout; wrap the call in [`tokio::time::timeout`] for a
/// bounded wait.
///
/// # Errors
///
/// Returns [`BusError::Codec`] if the message cannot be encoded,
/// [`BusError::Transport`] on a send failure or socket error, and
/// [`BusError::ConnectionClosed`] if the socket closes before the reply.
pub async fn send_and_await(connection: &Connection, message: &Message) -> Result<Message, BusError> {
    let frame = codec::encode(message)?;
    PendingExchange::start(connection, message.id.clone(), frame)?
        .wait()
        .await
}
