//! Helpers shared by the integration tests

#![allow(dead_code)]

use rso_core::{
    CollectingListener, EventKind, SharedObjectEvent, SharedObjectMessage, SharedObjectScope,
};
use serde_json::Value;
use std::sync::Arc;

/// Build an inbound message from `peer`
pub fn inbound(so: &SharedObjectScope, peer: &CollectingListener, events: Vec<SharedObjectEvent>) -> SharedObjectMessage {
    SharedObjectMessage::new(so.name(), 0, so.is_persistent_object())
        .with_events(events)
        .with_source(peer.handle())
}

pub fn connect(so: &SharedObjectScope, peer: &CollectingListener) {
    so.dispatch_event(&inbound(so, peer, vec![SharedObjectEvent::bare(EventKind::ServerConnect)]));
}

pub fn disconnect(so: &SharedObjectScope, peer: &CollectingListener) {
    so.dispatch_event(&inbound(so, peer, vec![SharedObjectEvent::bare(EventKind::ServerDisconnect)]));
}

pub fn set_event(key: &str, value: Option<Value>) -> SharedObjectEvent {
    SharedObjectEvent::new(EventKind::ServerSetAttribute, Some(key.to_string()), value)
}

pub fn peer_set(so: &SharedObjectScope, peer: &CollectingListener, key: &str, value: Option<Value>) {
    so.dispatch_event(&inbound(so, peer, vec![set_event(key, value)]));
}

/// A peer that has joined `so`, with its join traffic already drained
pub fn joined(so: &SharedObjectScope) -> CollectingListener {
    let peer = CollectingListener::new();
    connect(so, &peer);
    peer.take();
    peer
}

pub fn kinds(messages: &[Arc<SharedObjectMessage>]) -> Vec<Vec<EventKind>> {
    messages.iter().map(|m| m.kinds()).collect()
}
