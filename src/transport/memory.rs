//! In-process connections.
//!
//! [`pair`] returns a [`Connection`] whose far end is a [`MemoryPeer`]
//! rather than a socket. The peer sees every frame the connection sends and
//! can inject message, error and close events, which makes it the
//! stand-in for a remote socket in tests and in-process embeddings.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::Connection;
use super::connection::{ABNORMAL_CLOSURE, OutboundFrame};
use super::listeners::{ListenerRegistry, SocketEvent};
use crate::codec::{self, CodecError, Message};
use crate::error::TransportFault;

/// The far end of an in-process [`Connection`].
#[derive(Debug)]
pub struct MemoryPeer {
    sent: mpsc::UnboundedReceiver<OutboundFrame>,
    listeners: Arc<ListenerRegistry>,
}

/// Creates a connected in-process pair.
#[must_use]
pub fn pair() -> (Connection, MemoryPeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listeners = Arc::new(ListenerRegistry::new());
    let connection = Connection::from_parts(tx, Arc::clone(&listeners));
    let peer = MemoryPeer {
        sent: rx,
        listeners,
    };
    (connection, peer)
}

impl MemoryPeer {
    /// Waits for the next frame sent by the connection.
    ///
    /// A close frame is echoed back as a close event, as a real peer would.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        let frame = self.sent.recv().await?;
        self.echo_close(&frame);
        Some(frame)
    }

    /// Returns the next sent frame if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<OutboundFrame> {
        let frame = self.sent.try_recv().ok()?;
        self.echo_close(&frame);
        Some(frame)
    }

    /// Waits for the next text frame and decodes it, skipping close frames.
    ///
    /// Returns `None` once the connection side is gone.
    pub async fn next_message(&mut self) -> Option<Result<Message, CodecError>> {
        loop {
            if let OutboundFrame::Text(text) = self.next_frame().await? {
                return Some(codec::decode(&text));
            }
        }
    }

    fn echo_close(&self, frame: &OutboundFrame) {
        if let OutboundFrame::Close { code, reason } = frame {
            self.close(*code, reason.clone());
        }
    }

    /// Delivers a raw text frame to the connection's listeners.
    ///
    /// Returns the number of listeners that received it.
    pub fn deliver_text(&self, frame: impl Into<String>) -> usize {
        self.listeners.dispatch(SocketEvent::Message(frame.into()))
    }

    /// Encodes and delivers a message.
    ///
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the message cannot be encoded.
    pub fn deliver(&self, message: &Message) -> Result<usize, CodecError> {
        Ok(self.deliver_text(codec::encode(message)?))
    }

    /// Reports a transport error on the connection.
    pub fn fail<E>(&self, err: E) -> usize
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.fail_with(Arc::new(err))
    }

    /// Reports an already shared transport error on the connection.
    pub fn fail_with(&self, fault: TransportFault) -> usize {
        self.listeners.dispatch(SocketEvent::Error(fault))
    }

    /// Closes the connection with the given code and reason.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> usize {
        self.listeners.dispatch(SocketEvent::Close {
            code,
            reason: reason.into(),
        })
    }
}

/// Dropping the peer is the in-process counterpart of a socket vanishing
/// without a close handshake.
impl Drop for MemoryPeer {
    fn drop(&mut self) {
        self.listeners.dispatch(SocketEvent::Close {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn peer_captures_sent_frames() {
        let (conn, mut peer) = pair();
        assert!(conn.send_text("abc").is_ok());

        let Some(OutboundFrame::Text(text)) = peer.next_frame().await else {
            panic!("expected a text frame");
        };
        assert_eq!(text, "abc");
    }

    #[tokio::test]
    async fn next_message_decodes() {
        let (conn, mut peer) = pair();
        let msg = Message::new("m1", json!({"k": "v"}));
        let Ok(frame) = codec::encode(&msg) else {
            panic!("encode");
        };
        assert!(conn.send_text(frame).is_ok());

        let Some(Ok(received)) = peer.next_message().await else {
            panic!("expected a decodable message");
        };
        assert_eq!(received, msg);
    }

    #[test]
    fn close_marks_connection_closed() {
        let (conn, peer) = pair();
        assert!(conn.is_open());
        peer.close(1000, "done");
        assert!(!conn.is_open());
        assert!(conn.send_text("late").is_err());
    }

    #[test]
    fn local_close_is_echoed() {
        let (conn, mut peer) = pair();
        assert!(conn.close(1000, "bye").is_ok());
        let Some(OutboundFrame::Close { code, .. }) = peer.try_next_frame() else {
            panic!("expected a close frame");
        };
        assert_eq!(code, 1000);
        assert!(!conn.is_open());
    }

    #[test]
    fn dropping_peer_stops_sends() {
        let (conn, peer) = pair();
        drop(peer);
        assert!(!conn.is_open());
        assert!(conn.send_text("x").is_err());
    }

    #[tokio::test]
    async fn dropping_peer_reports_abnormal_close() {
        let (conn, peer) = pair();
        let mut listener = conn.listen();
        drop(peer);

        let Some(SocketEvent::Close { code, reason }) = listener.recv().await else {
            panic!("expected a close event");
        };
        assert_eq!(code, ABNORMAL_CLOSURE);
        assert!(reason.is_empty());
    }

    #[tokio::test]
    async fn drop_after_close_keeps_first_close() {
        let (conn, peer) = pair();
        peer.close(1000, "done");
        drop(peer);

        let mut listener = conn.listen();
        let Some(SocketEvent::Close { code, .. }) = listener.recv().await else {
            panic!("expected the recorded close");
        };
        assert_eq!(code, 1000);
    }
}
