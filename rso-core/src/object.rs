//! The shared object state container
//!
//! A [`SharedObject`] owns the attribute map, the version counter and two
//! event queues: one for the peer that started the current update (the
//! *owner*) and one fanned out to every other subscriber. Mutators fill the
//! queues; when the outermost update ends the queues are flushed as one
//! message per recipient.
//!
//! ```text
//!   begin_update(A)
//!     set("x", 1)  ──► owner:     [UPDATE_ATTRIBUTE x]
//!                  ──► broadcast: [UPDATE_DATA x=1]
//!     set("y", 2)  ──► owner:     [.., UPDATE_ATTRIBUTE y]
//!                  ──► broadcast: [.., UPDATE_DATA y=2]
//!   end_update()   ──► version += 1
//!                  ──► A gets one owner message
//!                  ──► B, C.. get one broadcast message
//! ```
//!
//! The object itself does no locking; it lives behind the mutex of its
//! [`SharedObjectScope`](crate::shared_scope::SharedObjectScope).

use crate::attributes::AttributeStore;
use crate::event::{EventKind, SharedObjectEvent};
use crate::listener::{ListenerHandle, ListenerSet};
use crate::message::SharedObjectMessage;
use crate::persistence::{PersistedObject, PersistenceStore};
use crate::types::ListenerId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Change counters, for observability only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ObjectStats {
    /// Attribute writes that changed a value
    pub changes: u64,
    /// Attributes deleted
    pub deletes: u64,
    /// Messages sent through the object
    pub sends: u64,
}

/// Authoritative state of one named shared object
pub struct SharedObject {
    name: String,
    path: String,
    persistent_object: bool,
    persistent: bool,
    version: Arc<AtomicU32>,
    creation_time: DateTime<Utc>,
    last_modified: Option<DateTime<Utc>>,
    attributes: AttributeStore,
    listeners: Arc<ListenerSet>,
    update_depth: u32,
    modified: bool,
    source: Option<ListenerHandle>,
    owner_queue: Vec<SharedObjectEvent>,
    broadcast_queue: Vec<SharedObjectEvent>,
    stats: ObjectStats,
    store: Option<Arc<dyn PersistenceStore>>,
}

impl SharedObject {
    /// Create an empty object at version 1
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        persistent_object: bool,
        store: Option<Arc<dyn PersistenceStore>>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            persistent_object,
            persistent: false,
            version: Arc::new(AtomicU32::new(1)),
            creation_time: Utc::now(),
            last_modified: None,
            attributes: AttributeStore::new(),
            listeners: Arc::new(ListenerSet::new()),
            update_depth: 0,
            modified: false,
            source: None,
            owner_queue: Vec::new(),
            broadcast_queue: Vec::new(),
            stats: ObjectStats::default(),
            store,
        }
    }

    /// Rebuild an object from its stored form
    ///
    /// A loaded object counts as saved (`is_persistent`); its declared kind
    /// stays what the caller asked for.
    pub fn from_persisted(
        persisted: PersistedObject,
        persistent_object: bool,
        store: Option<Arc<dyn PersistenceStore>>,
    ) -> Self {
        let mut object = Self::new(persisted.name, persisted.path, persistent_object, store);
        object.persistent = true;
        object.version.store(persisted.version.max(1), Ordering::Release);
        object.attributes = AttributeStore::from_map(persisted.attributes);
        object
    }

    /// Stored form of the current state
    pub fn to_persisted(&self) -> PersistedObject {
        PersistedObject {
            name: self.name.clone(),
            path: self.path.clone(),
            version: self.version(),
            attributes: self.attributes.to_map(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub(crate) fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    pub(crate) fn version_counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.version)
    }

    /// Declared persistent at creation
    pub fn is_persistent_object(&self) -> bool {
        self.persistent_object
    }

    /// Actually stored (or loaded from a store)
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.last_modified
    }

    /// Read an attribute without side effects
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains(key)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.names()
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.attributes.to_map()
    }

    pub fn listeners(&self) -> Arc<Vec<ListenerHandle>> {
        self.listeners.snapshot()
    }

    pub(crate) fn listener_set(&self) -> Arc<ListenerSet> {
        Arc::clone(&self.listeners)
    }

    pub fn update_depth(&self) -> u32 {
        self.update_depth
    }

    /// Has the current update changed anything yet
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn stats(&self) -> ObjectStats {
        self.stats
    }

    pub fn store(&self) -> Option<&Arc<dyn PersistenceStore>> {
        self.store.as_ref()
    }

    pub fn set_store(&mut self, store: Option<Arc<dyn PersistenceStore>>) {
        self.store = store;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Update blocks
    // ─────────────────────────────────────────────────────────────────────

    /// Open an update block
    ///
    /// The outermost block decides who the owner is; a nested block only
    /// fills the owner in when none was given yet.
    pub fn begin_update(&mut self, source: Option<ListenerHandle>) {
        if self.update_depth == 0 || self.source.is_none() {
            self.source = source;
        }
        self.update_depth += 1;
    }

    /// Close an update block, flushing when the outermost one ends
    ///
    /// # Panics
    ///
    /// Panics when no update block is open.
    pub fn end_update(&mut self) {
        assert!(
            self.update_depth > 0,
            "end_update without begin_update on shared object {}",
            self.name
        );
        self.update_depth -= 1;
        if self.update_depth == 0 {
            self.notify_modified();
            self.source = None;
        }
    }

    fn with_update<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.begin_update(None);
        let result = f(self);
        self.end_update();
        result
    }

    fn push_owner(&mut self, kind: EventKind, key: Option<&str>, value: Option<Value>) {
        self.owner_queue
            .push(SharedObjectEvent::new(kind, key.map(str::to_string), value));
    }

    fn push_broadcast(&mut self, kind: EventKind, key: Option<&str>, value: Option<Value>) {
        self.broadcast_queue
            .push(SharedObjectEvent::new(kind, key.map(str::to_string), value));
    }

    fn notify_modified(&mut self) {
        if self.update_depth > 0 {
            return;
        }

        if self.modified {
            let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
            self.last_modified = Some(Utc::now());
            trace!(object = %self.name, version, "shared object modified");

            if let Some(store) = self.store.clone() {
                match store.save(&self.to_persisted()) {
                    Ok(()) => {
                        if self.persistent_object {
                            self.persistent = true;
                        }
                    }
                    Err(err) => {
                        error!(object = %self.name, store = store.kind(), %err, "failed to save shared object")
                    }
                }
            }
        }

        self.send_updates();
        self.modified = false;
    }

    fn send_updates(&mut self) {
        let version = self.version();

        let owner_events = mem::take(&mut self.owner_queue);
        if !owner_events.is_empty() {
            if let Some(source) = &self.source {
                match source.channel() {
                    Some(channel) => {
                        let message =
                            SharedObjectMessage::new(&self.name, version, self.persistent_object)
                                .with_events(owner_events);
                        channel.write(Arc::new(message));
                    }
                    None if source.is_connection() => {
                        warn!(object = %self.name, listener = %source.id(), "shared object channel not found")
                    }
                    None => {}
                }
            }
        }

        let sync_events = mem::take(&mut self.broadcast_queue);
        if sync_events.is_empty() {
            return;
        }
        let message = Arc::new(
            SharedObjectMessage::new(&self.name, version, self.persistent_object)
                .with_events(sync_events),
        );
        for listener in self.listeners.snapshot().iter() {
            if self.source.as_ref() == Some(listener) {
                continue;
            }
            match listener.channel() {
                Some(channel) => {
                    debug!(object = %self.name, listener = %listener.id(), version, "sync");
                    channel.write(Arc::clone(&message));
                }
                None => {
                    warn!(object = %self.name, listener = %listener.id(), "cannot sync to a non-network listener")
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────

    /// Read an attribute, creating it with `default` on a miss
    ///
    /// A miss is a change: everyone is told about the new entry.
    pub fn get(&mut self, key: &str, default: Value) -> Value {
        if let Some(value) = self.attributes.get(key) {
            return value.clone();
        }
        self.with_update(|so| {
            so.attributes.get_or_insert(key, default.clone());
            so.modified = true;
            so.push_owner(EventKind::ClientUpdateData, Some(key), Some(default.clone()));
            so.push_broadcast(EventKind::ClientUpdateData, Some(key), Some(default.clone()));
        });
        default
    }

    /// Write an attribute; `None` deletes it
    ///
    /// The owner always gets an `UPDATE_ATTRIBUTE` acknowledgement, even
    /// when nothing changed.
    pub fn set(&mut self, key: &str, value: Option<Value>) -> bool {
        let value = value.filter(|v| !v.is_null());
        self.with_update(|so| {
            so.push_owner(EventKind::ClientUpdateAttribute, Some(key), None);
            match value {
                None => {
                    if !so.attributes.remove(key) {
                        return false;
                    }
                    so.modified = true;
                    so.stats.deletes += 1;
                    so.push_broadcast(EventKind::ClientDeleteData, Some(key), None);
                    true
                }
                Some(value) => {
                    if !so.attributes.set(key, value.clone()) {
                        return false;
                    }
                    so.modified = true;
                    so.stats.changes += 1;
                    so.push_broadcast(EventKind::ClientUpdateData, Some(key), Some(value));
                    true
                }
            }
        })
    }

    /// Write several attributes as one update
    ///
    /// Returns the entries that actually changed; `None` marks a key that a
    /// null value deleted.
    pub fn set_attributes(&mut self, values: BTreeMap<String, Value>) -> BTreeMap<String, Option<Value>> {
        self.with_update(|so| {
            let mut changed = BTreeMap::new();
            for (key, value) in values {
                let value = Some(value).filter(|v| !v.is_null());
                if so.set(&key, value.clone()) {
                    changed.insert(key, value);
                }
            }
            changed
        })
    }

    /// Delete an attribute; the owner is told either way
    pub fn remove(&mut self, key: &str) -> bool {
        self.with_update(|so| {
            so.push_owner(EventKind::ClientDeleteData, Some(key), None);
            if !so.attributes.remove(key) {
                return false;
            }
            so.modified = true;
            so.stats.deletes += 1;
            so.push_broadcast(EventKind::ClientDeleteData, Some(key), None);
            true
        })
    }

    /// Delete every attribute, one event per key
    pub fn remove_all(&mut self) {
        self.with_update(|so| {
            for key in so.attributes.names() {
                so.push_owner(EventKind::ClientDeleteData, Some(&key), None);
                so.push_broadcast(EventKind::ClientDeleteData, Some(&key), None);
                so.stats.deletes += 1;
            }
            so.attributes.clear();
            so.modified = true;
        });
    }

    /// Drop every attribute with a single `CLEAR_DATA` event
    pub fn clear(&mut self) -> bool {
        self.with_update(|so| {
            so.attributes.clear();
            let name = so.name.clone();
            so.push_owner(EventKind::ClientClearData, Some(&name), None);
            so.push_broadcast(EventKind::ClientClearData, Some(&name), None);
            so.modified = true;
            so.stats.changes += 1;
        });
        true
    }

    /// Broadcast a message to every subscriber, the owner included
    pub fn send_message(&mut self, handler: &str, arguments: Vec<Value>) {
        self.with_update(|so| {
            let arguments = Value::Array(arguments);
            so.push_owner(EventKind::ClientSendMessage, Some(handler), Some(arguments.clone()));
            so.push_broadcast(EventKind::ClientSendMessage, Some(handler), Some(arguments));
            so.modified = true;
            so.stats.sends += 1;
        });
    }

    /// Re-broadcast an attribute whose nested contents changed in place
    pub fn set_dirty(&mut self, key: &str) {
        self.with_update(|so| {
            let current = so.attributes.get(key).cloned();
            so.push_broadcast(EventKind::ClientUpdateData, Some(key), current);
            so.modified = true;
            so.stats.changes += 1;
        });
    }

    /// Queue a status error for the owner
    pub fn return_error(&mut self, status: &str) {
        self.push_owner(
            EventKind::ClientStatus,
            Some(status),
            Some(Value::String("error".to_string())),
        );
    }

    /// Queue the server's value of `key` for the owner
    pub fn return_attribute_value(&mut self, key: &str) {
        let current = self.attributes.get(key).cloned();
        self.push_owner(EventKind::ClientUpdateData, Some(key), current);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Subscribers
    // ─────────────────────────────────────────────────────────────────────

    /// Subscribe a listener and send it the current state
    pub fn register(&mut self, listener: ListenerHandle) {
        debug!(object = %self.name, listener = %listener.id(), "register");
        self.listeners.insert(listener.clone());
        self.begin_update(Some(listener));
        self.push_owner(EventKind::ClientInitialData, None, None);
        if !self.persistent_object {
            self.push_owner(EventKind::ClientClearData, None, None);
        }
        if !self.attributes.is_empty() {
            let state = self.attributes.to_value();
            self.push_owner(EventKind::ClientUpdateData, None, Some(state));
        }
        self.end_update();
    }

    /// Unsubscribe a listener
    ///
    /// Returns true when this released the object: a transient object with
    /// no subscribers left is removed from its store and closed.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        self.remove_listener(id);
        self.check_release()
    }

    /// Drop a listener without deciding about release yet
    pub(crate) fn remove_listener(&mut self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        if removed {
            debug!(object = %self.name, listener = %id, "unregister");
        }
        removed
    }

    /// Release a transient object nobody listens to any more
    pub(crate) fn check_release(&mut self) -> bool {
        if self.persistent_object || !self.listeners.is_empty() {
            return false;
        }
        debug!(object = %self.name, "releasing transient shared object");
        if let Some(store) = &self.store {
            if let Err(err) = store.remove(&self.name) {
                error!(object = %self.name, store = store.kind(), %err, "failed to remove shared object from store");
            }
        }
        self.close();
        true
    }

    /// Drop all state, subscribers and pending events
    ///
    /// A closed object is detached from its store, so later writes through a
    /// stale handle never reach storage.
    pub fn close(&mut self) {
        self.store = None;
        self.attributes.clear();
        self.listeners.clear();
        self.owner_queue.clear();
        self.broadcast_queue.clear();
    }
}

impl fmt::Debug for SharedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObject")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("version", &self.version())
            .field("persistent_object", &self.persistent_object)
            .field("attributes", &self.attributes.len())
            .field("listeners", &self.listeners.len())
            .field("update_depth", &self.update_depth)
            .finish()
    }
}
