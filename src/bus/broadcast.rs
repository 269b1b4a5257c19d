//! Fire-and-forget broadcast.

use crate::codec::{self, Message};
use crate::error::BusError;
use crate::transport::{Connection, ConnectionId};

/// Per-connection result of a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Number of connections the frame was queued on.
    pub delivered: usize,
    /// Connections that were no longer open.
    pub failed: Vec<ConnectionId>,
}

impl BroadcastReport {
    /// Returns `true` if every connection accepted the frame.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Encodes `message` once and queues the same frame on every connection.
///
/// Does not wait for acknowledgement or reply. A connection that is no
/// longer open is logged and listed in the report; it never stops the
/// frame from reaching the others.
///
/// # Errors
///
/// Returns [`BusError::Codec`] if the message cannot be encoded, before
/// anything is sent.
pub fn broadcast_and_disregard<'a, I>(
    connections: I,
    message: &Message,
) -> Result<BroadcastReport, BusError>
where
    I: IntoIterator<Item = &'a Connection>,
{
    let frame = codec::encode(message)?;
    let mut report = BroadcastReport::default();

    for connection in connections {
        match connection.send_text(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                tracing::warn!(connection = %connection.id(), error = %e, "broadcast send failed");
                report.failed.push(connection.id());
            }
        }
    }

    tracing::debug!(
        id = %message.id,
        delivered = report.delivered,
        failed = report.failed.len(),
        "message broadcast"
    );
    Ok(report)
}
