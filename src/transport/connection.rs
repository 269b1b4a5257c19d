//! Connection handle and its socket tasks.
//!
//! A [`Connection`] is a cheap, cloneable handle to one open WebSocket.
//! Attaching a socket spawns two tasks: a writer that drains the outbound
//! queue into the socket sink, and a reader that turns inbound frames into
//! [`SocketEvent`]s for the connection's [`ListenerRegistry`].

use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;

use super::ConnectionId;
use super::listeners::{Listener, ListenerRegistry, SocketEvent};
use super::wire::{Inbound, WireMessage};
use crate::error::BusError;

/// Close code reported when the stream ends without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported for a close frame that carried no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// A frame queued for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// A text frame.
    Text(String),
    /// A close frame; the writer stops after sending it.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Handle to one open socket.
///
/// The caller owns the lifecycle: the socket stays open until either side
/// closes it, regardless of how many handles are dropped.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    listeners: Arc<ListenerRegistry>,
}

impl Connection {
    /// Builds a handle from its parts without spawning any task.
    pub(crate) fn from_parts(
        outbound: mpsc::UnboundedSender<OutboundFrame>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            outbound,
            listeners,
        }
    }

    /// Attaches an upgraded socket and spawns its reader and writer tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn attach<S, M, E>(socket: S) -> Self
    where
        S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + 'static,
        M: WireMessage + Send + Unpin + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(ListenerRegistry::new());
        let connection = Self::from_parts(tx, Arc::clone(&listeners));
        let (sink, stream) = socket.split::<M>();

        tokio::spawn(write_loop::<_, M>(
            connection.id,
            sink,
            rx,
            Arc::clone(&listeners),
        ));
        tokio::spawn(read_loop(connection.id, stream, listeners));

        tracing::debug!(connection = %connection.id, "connection attached");
        connection
    }

    /// Returns the connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues a text frame for sending. Never waits on the socket.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] with a `NotConnected` cause if the
    /// socket has closed or its writer has stopped.
    pub fn send_text(&self, frame: impl Into<String>) -> Result<(), BusError> {
        if self.listeners.is_closed() {
            return Err(not_connected(self.id));
        }
        self.outbound
            .send(OutboundFrame::Text(frame.into()))
            .map_err(|_| not_connected(self.id))
    }

    /// Starts the close handshake.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Transport`] if the writer has already stopped.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), BusError> {
        self.outbound
            .send(OutboundFrame::Close {
                code,
                reason: reason.into(),
            })
            .map_err(|_| not_connected(self.id))
    }

    /// Returns `true` until the socket has closed or its writer has stopped.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.listeners.is_closed() && !self.outbound.is_closed()
    }

    /// Registers a listener for this connection's events.
    #[must_use]
    pub fn listen(&self) -> Listener {
        self.listeners.register()
    }

    /// Returns the number of listeners currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

fn not_connected(id: ConnectionId) -> BusError {
    BusError::transport(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        format!("connection {id} is no longer open"),
    ))
}

/// Drains the outbound queue into the socket. A failed write is reported
/// to the listeners as an error event and stops the writer.
async fn write_loop<K, M>(
    id: ConnectionId,
    mut sink: K,
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    listeners: Arc<ListenerRegistry>,
) where
    K: Sink<M> + Unpin,
    K::Error: std::error::Error + Send + Sync + 'static,
    M: WireMessage,
{
    while let Some(frame) = rx.recv().await {
        let is_close = matches!(frame, OutboundFrame::Close { .. });
        let message = match frame {
            OutboundFrame::Text(text) => M::text(text),
            OutboundFrame::Close { code, reason } => M::close(code, reason),
        };
        if let Err(e) = sink.send(message).await {
            tracing::debug!(connection = %id, error = %e, "socket write failed");
            listeners.dispatch(SocketEvent::Error(Arc::new(e)));
            break;
        }
        if is_close {
            break;
        }
    }
    tracing::trace!(connection = %id, "writer stopped");
}

/// Turns inbound frames into events until the socket closes.
///
/// After a close frame the stream is still polled to its end so the
/// library can flush its close reply and finish the handshake.
async fn read_loop<T, M, E>(id: ConnectionId, mut stream: T, listeners: Arc<ListenerRegistry>)
where
    T: Stream<Item = Result<M, E>> + Unpin,
    M: WireMessage,
    E: std::error::Error + Send + Sync + 'static,
{
    let (code, reason, handshake) = loop {
        match stream.next().await {
            Some(Ok(message)) => match message.into_inbound() {
                Inbound::Text(text) => {
                    let delivered = listeners.dispatch(SocketEvent::Message(text));
                    tracing::trace!(connection = %id, delivered, "frame dispatched");
                }
                Inbound::Close { code, reason } => break (code, reason, true),
                Inbound::Control => {}
            },
            Some(Err(e)) => {
                tracing::debug!(connection = %id, error = %e, "socket read failed");
                listeners.dispatch(SocketEvent::Error(Arc::new(e)));
                break (ABNORMAL_CLOSURE, String::new(), false);
            }
            None => break (ABNORMAL_CLOSURE, String::new(), false),
        }
    };

    tracing::debug!(connection = %id, code, %reason, "connection closed");
    listeners.dispatch(SocketEvent::Close { code, reason });

    if handshake {
        while let Some(Ok(_)) = stream.next().await {}
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures_util::stream;
    use serde_json::json;
    use tokio_tungstenite::tungstenite;

    use super::*;
    use crate::bus::send_and_await;
    use crate::codec::Message;

    type Frames = Vec<Result<tungstenite::Message, std::io::Error>>;

    async fn run_reader(frames: Frames) -> Vec<SocketEvent> {
        let listeners = Arc::new(ListenerRegistry::new());
        let mut listener = listeners.register();
        read_loop(ConnectionId::new(), stream::iter(frames), Arc::clone(&listeners)).await;

        let mut events = Vec::new();
        listener.deregister();
        while let Some(event) = listener.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn stream_end_reports_abnormal_close() {
        let events = run_reader(vec![Ok(tungstenite::Message::text("frame"))]).await;
        let [SocketEvent::Message(text), SocketEvent::Close { code, reason }] = events.as_slice()
        else {
            panic!("expected message then close, got {events:?}");
        };
        assert_eq!(text, "frame");
        assert_eq!(*code, ABNORMAL_CLOSURE);
        assert!(reason.is_empty());
    }

    #[tokio::test]
    async fn read_error_reports_error_then_abnormal_close() {
        let events = run_reader(vec![Err(std::io::Error::other("reset"))]).await;
        let [SocketEvent::Error(cause), SocketEvent::Close { code, reason }] = events.as_slice()
        else {
            panic!("expected error then close, got {events:?}");
        };
        assert_eq!(cause.to_string(), "reset");
        assert_eq!(*code, ABNORMAL_CLOSURE);
        assert!(reason.is_empty());
    }

    #[tokio::test]
    async fn close_frame_keeps_reading_to_the_end() {
        let polled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polled);
        let frames: Frames = vec![
            Ok(<tungstenite::Message as WireMessage>::close(1000, "done".to_string())),
            Ok(tungstenite::Message::text("after close")),
        ];
        let listeners = Arc::new(ListenerRegistry::new());
        let mut listener = listeners.register();
        let source = stream::iter(frames).inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        read_loop(ConnectionId::new(), source, Arc::clone(&listeners)).await;

        assert_eq!(polled.load(Ordering::SeqCst), 2);
        let Some(SocketEvent::Close { code, reason }) = listener.recv().await else {
            panic!("expected the close event first");
        };
        assert_eq!(code, 1000);
        assert_eq!(reason, "done");
        listener.deregister();
        assert!(listener.recv().await.is_none());
    }

    #[tokio::test]
    async fn write_failure_fails_pending_exchange() {
        let (tx, rx) = mpsc::unbounded_channel();
        let listeners = Arc::new(ListenerRegistry::new());
        let connection = Connection::from_parts(tx, Arc::clone(&listeners));
        let sink = Box::pin(futures_util::sink::unfold(
            (),
            |(), _: tungstenite::Message| async {
                Err::<(), _>(std::io::Error::other("broken pipe"))
            },
        ));
        tokio::spawn(write_loop::<_, tungstenite::Message>(
            connection.id(),
            sink,
            rx,
            listeners,
        ));

        let result = send_and_await(&connection, &Message::new("w", json!(null))).await;
        let Err(BusError::Transport(cause)) = result else {
            panic!("expected Transport error");
        };
        assert_eq!(cause.to_string(), "broken pipe");
        assert_eq!(connection.listener_count(), 0);
    }
}
