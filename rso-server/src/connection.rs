//! WebSocket peers as shared object listeners.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rso_core::{
    Channel, Connection, EventListener, ListenerHandle, ListenerId, SharedObjectMessage,
    SharedObjectScope, SHARED_OBJECT_CHANNEL,
};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Outbound queue of one socket; the session task drains the receiver.
pub struct OutboundChannel {
    tx: mpsc::UnboundedSender<Arc<SharedObjectMessage>>,
}

impl Channel for OutboundChannel {
    fn write(&self, message: Arc<SharedObjectMessage>) {
        if self.tx.send(message).is_err() {
            trace!("dropping message for a closed socket");
        }
    }
}

/// One connected WebSocket client
pub struct WsConnection {
    id: ListenerId,
    outbound: Arc<OutboundChannel>,
    /// Objects this peer is subscribed to, keyed by (scope path, object name)
    joined: Mutex<HashMap<(String, String), Arc<SharedObjectScope>>>,
}

impl WsConnection {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Arc<SharedObjectMessage>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            id: ListenerId::new(),
            outbound: Arc::new(OutboundChannel { tx }),
            joined: Mutex::new(HashMap::new()),
        });
        (conn, rx)
    }

    pub fn handle(self: &Arc<Self>) -> ListenerHandle {
        ListenerHandle::from_arc(Arc::clone(self) as Arc<dyn EventListener>)
    }

    /// Remember or forget `so` depending on whether we are still subscribed
    pub fn sync_membership(&self, so: &Arc<SharedObjectScope>) {
        let key = (so.path().to_string(), so.name().to_string());
        let mut joined = self.joined.lock();
        if so.has_listener(self.id) {
            joined.insert(key, Arc::clone(so));
        } else {
            joined.remove(&key);
        }
    }

    pub fn joined_count(&self) -> usize {
        self.joined.lock().len()
    }

    /// Unsubscribe from everything this peer joined
    pub fn close(self: &Arc<Self>) {
        let joined: Vec<_> = self.joined.lock().drain().map(|(_, so)| so).collect();
        let handle = self.handle();
        for so in joined {
            let released = so.remove_event_listener(&handle);
            debug!(listener = %self.id, object = so.name(), released, "left shared object");
        }
    }
}

impl EventListener for WsConnection {
    fn id(&self) -> ListenerId {
        self.id
    }

    fn as_connection(&self) -> Option<&dyn Connection> {
        Some(self)
    }
}

impl Connection for WsConnection {
    fn channel(&self, id: u8) -> Option<Arc<dyn Channel>> {
        (id == SHARED_OBJECT_CHANNEL).then(|| Arc::clone(&self.outbound) as Arc<dyn Channel>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_shared_object_channel() {
        let (conn, _rx) = WsConnection::new();
        assert!(conn.channel(SHARED_OBJECT_CHANNEL).is_some());
        assert!(conn.channel(1).is_none());
        assert!(conn.handle().is_connection());
    }

    #[test]
    fn test_write_lands_in_receiver() {
        let (conn, mut rx) = WsConnection::new();
        let channel = conn.channel(SHARED_OBJECT_CHANNEL).unwrap();
        channel.write(Arc::new(SharedObjectMessage::new("board", 1, false)));
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.name(), "board");
    }

    #[test]
    fn test_write_after_receiver_dropped_is_silent() {
        let (conn, rx) = WsConnection::new();
        drop(rx);
        let channel = conn.channel(SHARED_OBJECT_CHANNEL).unwrap();
        channel.write(Arc::new(SharedObjectMessage::new("board", 1, false)));
    }
}
