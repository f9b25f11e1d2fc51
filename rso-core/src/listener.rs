//! Listener and channel contracts
//!
//! The engine never touches a socket. A subscribed peer is an
//! [`EventListener`]; when it is backed by a network connection it exposes
//! a [`Connection`], whose data channels accept finished messages.

use crate::cow::CowVec;
use crate::message::SharedObjectMessage;
use crate::types::ListenerId;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Data channel used for shared object traffic
pub const SHARED_OBJECT_CHANNEL: u8 = 3;

/// A transport channel of one connection
///
/// `write` hands the message off and returns; it must not block on I/O.
pub trait Channel: Send + Sync {
    fn write(&self, message: Arc<SharedObjectMessage>);
}

/// A network connection able to carry shared object messages
pub trait Connection: Send + Sync {
    /// Look up a data channel by id
    fn channel(&self, id: u8) -> Option<Arc<dyn Channel>>;
}

/// Anything that can subscribe to a shared object
pub trait EventListener: Send + Sync {
    /// Stable identity of this listener
    fn id(&self) -> ListenerId;

    /// The network connection behind this listener, if any
    ///
    /// Only network listeners receive owner replies and broadcasts.
    fn as_connection(&self) -> Option<&dyn Connection> {
        None
    }
}

/// Shared handle to a listener, compared by [`ListenerId`]
#[derive(Clone)]
pub struct ListenerHandle(Arc<dyn EventListener>);

impl ListenerHandle {
    pub fn new(listener: impl EventListener + 'static) -> Self {
        Self(Arc::new(listener))
    }

    pub fn from_arc(listener: Arc<dyn EventListener>) -> Self {
        Self(listener)
    }

    pub fn id(&self) -> ListenerId {
        self.0.id()
    }

    /// Is this a network-backed listener
    pub fn is_connection(&self) -> bool {
        self.0.as_connection().is_some()
    }

    /// Shared object channel of the underlying connection
    pub fn channel(&self) -> Option<Arc<dyn Channel>> {
        self.0
            .as_connection()
            .and_then(|conn| conn.channel(SHARED_OBJECT_CHANNEL))
    }

    pub fn inner(&self) -> &Arc<dyn EventListener> {
        &self.0
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for ListenerHandle {}

impl Hash for ListenerHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ListenerHandle").field(&self.id()).finish()
    }
}

/// The subscriber set of one object
///
/// Backed by a [`CowVec`]: a broadcast iterates a snapshot and is never
/// disturbed by concurrent `insert`/`remove`.
#[derive(Debug, Default)]
pub struct ListenerSet {
    inner: CowVec<ListenerHandle>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; returns false if it was already present
    pub fn insert(&self, listener: ListenerHandle) -> bool {
        let id = listener.id();
        self.inner.push_unless(listener, |l| l.id() == id)
    }

    /// Remove a listener by id; returns false if it was absent
    pub fn remove(&self, id: ListenerId) -> bool {
        self.inner.remove_where(|l| l.id() == id)
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.inner.snapshot().iter().any(|l| l.id() == id)
    }

    pub fn snapshot(&self) -> Arc<Vec<ListenerHandle>> {
        self.inner.snapshot()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Channel that keeps every message written to it
#[derive(Debug, Default)]
pub struct CollectingChannel {
    messages: Mutex<Vec<Arc<SharedObjectMessage>>>,
}

impl CollectingChannel {
    pub fn messages(&self) -> Vec<Arc<SharedObjectMessage>> {
        self.messages.lock().clone()
    }

    /// Drain the collected messages
    pub fn take(&self) -> Vec<Arc<SharedObjectMessage>> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl Channel for CollectingChannel {
    fn write(&self, message: Arc<SharedObjectMessage>) {
        self.messages.lock().push(message);
    }
}

/// A network listener that records its traffic
///
/// Useful for hosts and tests that want to observe exactly what a peer
/// would have received.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    id: ListenerId,
    channel: Arc<CollectingChannel>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to subscribe with
    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle::new(self.clone())
    }

    pub fn messages(&self) -> Vec<Arc<SharedObjectMessage>> {
        self.channel.messages()
    }

    pub fn take(&self) -> Vec<Arc<SharedObjectMessage>> {
        self.channel.take()
    }
}

impl EventListener for CollectingListener {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn as_connection(&self) -> Option<&dyn Connection> {
        Some(self)
    }
}

impl Connection for CollectingListener {
    fn channel(&self, id: u8) -> Option<Arc<dyn Channel>> {
        if id == SHARED_OBJECT_CHANNEL {
            let channel: Arc<dyn Channel> = self.channel.clone();
            Some(channel)
        } else {
            None
        }
    }
}
