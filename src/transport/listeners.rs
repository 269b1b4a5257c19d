//! Per-connection listener registry.
//!
//! Every pending exchange registers a [`Listener`] on the connection it
//! waits on. The connection's reader task calls [`ListenerRegistry::dispatch`]
//! for each socket event, which fans the event out to every registered
//! listener in registration-independent order. Each listener owns an
//! unbounded queue, so a slow listener never causes another to miss a frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::error::TransportFault;

/// An event observed on a socket.
#[derive(Debug, Clone)]
pub enum SocketEvent {
    /// A text (or UTF-8 binary) frame arrived.
    Message(String),
    /// The socket reported an error.
    Error(TransportFault),
    /// The socket closed.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason, possibly empty.
        reason: String,
    },
}

#[derive(Debug, Default)]
struct Inner {
    listeners: HashMap<u64, mpsc::UnboundedSender<SocketEvent>>,
    closed: Option<(u16, String)>,
}

/// Set of listeners registered on one connection.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl ListenerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new listener.
    ///
    /// A listener registered after the connection closed immediately
    /// receives the recorded close event, so it can never wait forever.
    pub fn register(self: &Arc<Self>) -> Listener {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        if let Some((code, reason)) = &inner.closed {
            let _ = tx.send(SocketEvent::Close {
                code: *code,
                reason: reason.clone(),
            });
        } else {
            inner.listeners.insert(id, tx);
        }
        Listener {
            id,
            rx,
            registry: Some(Arc::clone(self)),
        }
    }

    fn deregister(&self, id: u64) {
        self.lock().listeners.remove(&id);
    }

    /// Delivers `event` to every registered listener.
    ///
    /// A [`SocketEvent::Close`] also marks the registry closed; events
    /// dispatched after that are dropped. Returns the number of listeners
    /// that received the event.
    pub fn dispatch(&self, event: SocketEvent) -> usize {
        let mut inner = self.lock();
        if inner.closed.is_some() {
            return 0;
        }
        if let SocketEvent::Close { code, reason } = &event {
            inner.closed = Some((*code, reason.clone()));
        }
        inner
            .listeners
            .retain(|_, tx| tx.send(event.clone()).is_ok());
        inner.listeners.len()
    }

    /// Returns the number of currently registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` once a close event has been dispatched.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }
}

/// One registration in a [`ListenerRegistry`].
///
/// Deregisters itself on [`Listener::deregister`] or when dropped.
#[derive(Debug)]
pub struct Listener {
    id: u64,
    rx: mpsc::UnboundedReceiver<SocketEvent>,
    registry: Option<Arc<ListenerRegistry>>,
}

impl Listener {
    /// Waits for the next event. Returns `None` once deregistered and drained.
    pub async fn recv(&mut self) -> Option<SocketEvent> {
        self.rx.recv().await
    }

    /// Removes this listener from its registry. Idempotent.
    pub fn deregister(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.deregister(self.id);
        }
        self.rx.close();
    }

    /// Returns `true` while the listener is still registered.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registry.is_some()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.deregister();
    }
}
