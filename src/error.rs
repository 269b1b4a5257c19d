//! Bus error types.
//!
//! [`BusError`] is the single error type returned by the server bootstrap,
//! the correlated exchange and the first-responder aggregator. Transport
//! causes are kept behind an [`Arc`] so that one socket failure can be
//! delivered to every exchange pending on that socket.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::codec::CodecError;

/// Shared, type-erased cause of a socket-level failure.
pub type TransportFault = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the bus helpers.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The server could not bind its listening socket.
    #[error("failed to bind websocket server on {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A client connection could not be established.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        /// Target URL.
        url: String,
        /// Underlying handshake or I/O failure.
        #[source]
        source: TransportFault,
    },

    /// The socket reported an error while an exchange was pending.
    #[error("transport error: {0}")]
    Transport(#[source] TransportFault),

    /// The socket closed before a matching reply arrived.
    #[error("Socket connection closed with code '{code}' and reason '{reason}'")]
    ConnectionClosed {
        /// WebSocket close code.
        code: u16,
        /// Close reason sent by the closing side, possibly empty.
        reason: String,
    },

    /// Every exchange of a first-responder race failed.
    #[error("all {} exchanges failed", .0.len())]
    Aggregate(Vec<BusError>),

    /// The message could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl BusError {
    /// Wraps any error as a [`BusError::Transport`].
    pub fn transport<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport(Arc::new(err))
    }

    /// Returns `true` for [`BusError::ConnectionClosed`].
    #[must_use]
    pub const fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed { .. })
    }

    /// Returns the underlying errors of an [`BusError::Aggregate`], or an
    /// empty slice for every other variant.
    #[must_use]
    pub fn aggregated(&self) -> &[BusError] {
        match self {
            Self::Aggregate(errors) => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn closed_message_carries_code_and_reason() {
        let err = BusError::ConnectionClosed {
            code: 1000,
            reason: "done".to_string(),
        };
        assert!(err.is_connection_closed());
        assert_eq!(
            err.to_string(),
            "Socket connection closed with code '1000' and reason 'done'"
        );
    }

    #[test]
    fn aggregate_reports_count() {
        let err = BusError::Aggregate(vec![
            BusError::ConnectionClosed {
                code: 1001,
                reason: String::new(),
            },
            BusError::transport(std::io::Error::other("boom")),
        ]);
        assert_eq!(err.to_string(), "all 2 exchanges failed");
        assert_eq!(err.aggregated().len(), 2);
    }

    #[test]
    fn transport_keeps_source() {
        let err = BusError::transport(std::io::Error::other("reset by peer"));
        let Some(source) = std::error::Error::source(&err) else {
            panic!("transport error should expose its cause");
        };
        assert_eq!(source.to_string(), "reset by peer");
        assert!(err.aggregated().is_empty());
    }
}
