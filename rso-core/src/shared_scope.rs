//! Locked, access-controlled wrapper around one shared object
//!
//! Every mutation goes through an [`UpdateGuard`]: it holds the scope mutex
//! and an open update block on the object. Dropping the guard closes the
//! block (flushing if it was the outermost), releases the mutex and only
//! then runs the server-side observers and service handlers, so those may
//! call back into the scope.

use crate::cow::CowVec;
use crate::error::HandlerError;
use crate::event::EventKind;
use crate::handler::{split_handler_name, HandlerRegistry, ServiceHandler};
use crate::listener::{ListenerHandle, ListenerSet};
use crate::message::SharedObjectMessage;
use crate::object::{ObjectStats, SharedObject};
use crate::observer::SharedObjectListener;
use crate::persistence::PersistenceStore;
use crate::scope::Scope;
use crate::security::{check_chain, SecurityChain, SharedObjectSecurity};
use crate::types::{status, ListenerId};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, warn};

/// Change to report once the scope is unlocked
enum Notification {
    Connect,
    Disconnect,
    Update { key: String, value: Option<Value> },
    UpdateAll(BTreeMap<String, Value>),
    Delete(String),
    Clear,
    Send { handler: String, args: Vec<Value> },
}

/// A shared object registered in the scope tree
pub struct SharedObjectScope {
    name: String,
    path: String,
    parent: Weak<Scope>,
    persistent_object: bool,
    version: Arc<AtomicU32>,
    listeners: Arc<ListenerSet>,
    object: Mutex<SharedObject>,
    server_listeners: CowVec<Arc<dyn SharedObjectListener>>,
    handlers: HandlerRegistry,
    security: SecurityChain,
}

impl SharedObjectScope {
    /// Load `name` from `store`, or create it fresh and save it
    pub fn new(
        parent: &Arc<Scope>,
        name: &str,
        persistent: bool,
        store: Arc<dyn PersistenceStore>,
    ) -> Self {
        let path = parent.path().to_string();

        let loaded = store.load(name).unwrap_or_else(|err| {
            error!(object = name, store = store.kind(), %err, "failed to load shared object");
            None
        });

        let object = match loaded {
            Some(persisted) => {
                let mut object = SharedObject::from_persisted(persisted, persistent, Some(Arc::clone(&store)));
                object.set_name(name);
                object.set_path(path.clone());
                debug!(object = name, %path, version = object.version(), "loaded shared object");
                object
            }
            None => {
                let object = SharedObject::new(name, path.clone(), persistent, Some(Arc::clone(&store)));
                if let Err(err) = store.save(&object.to_persisted()) {
                    error!(object = name, store = store.kind(), %err, "failed to save shared object");
                }
                debug!(object = name, %path, persistent, "created shared object");
                object
            }
        };

        Self {
            name: name.to_string(),
            path,
            parent: Arc::downgrade(parent),
            persistent_object: object.is_persistent_object(),
            version: object.version_counter(),
            listeners: object.listener_set(),
            object: Mutex::new(object),
            server_listeners: CowVec::new(),
            handlers: HandlerRegistry::new(),
            security: SecurityChain::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lock-free reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<Arc<Scope>> {
        self.parent.upgrade()
    }

    pub fn version(&self) -> u32 {
        self.version.load(Ordering::Acquire)
    }

    pub fn is_persistent_object(&self) -> bool {
        self.persistent_object
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listeners(&self) -> Arc<Vec<ListenerHandle>> {
        self.listeners.snapshot()
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners.contains(id)
    }

    /// Is some thread inside an update right now
    pub fn is_locked(&self) -> bool {
        self.object.is_locked()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Locked reads
    // ─────────────────────────────────────────────────────────────────────

    pub fn is_persistent(&self) -> bool {
        self.object.lock().is_persistent()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.object.lock().last_modified()
    }

    pub fn attribute(&self, key: &str) -> Option<Value> {
        self.object.lock().attribute(key).cloned()
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.object.lock().has_attribute(key)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.object.lock().attribute_names()
    }

    pub fn attributes(&self) -> BTreeMap<String, Value> {
        self.object.lock().attributes()
    }

    pub fn stats(&self) -> ObjectStats {
        self.object.lock().stats()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Updates
    // ─────────────────────────────────────────────────────────────────────

    /// Lock the object and open an update block owned by `source`
    ///
    /// Everything done through the guard reaches subscribers as a single
    /// message per recipient when the guard is dropped.
    pub fn begin_update(&self, source: Option<ListenerHandle>) -> UpdateGuard<'_> {
        let mut object = self.object.lock();
        object.begin_update(source);
        UpdateGuard {
            scope: self,
            object: Some(object),
            pending: Vec::new(),
            disconnected: false,
        }
    }

    /// Read an attribute, creating it with `default` on a miss
    pub fn get_attribute(&self, key: &str, default: Value) -> Value {
        self.begin_update(None).get_attribute(key, default)
    }

    pub fn set_attribute(&self, key: &str, value: Option<Value>) -> bool {
        self.begin_update(None).set_attribute(key, value)
    }

    pub fn set_attributes(&self, values: BTreeMap<String, Value>) {
        self.begin_update(None).set_attributes(values);
    }

    pub fn remove_attribute(&self, key: &str) -> bool {
        self.begin_update(None).remove_attribute(key)
    }

    pub fn remove_attributes(&self) {
        self.begin_update(None).remove_attributes();
    }

    pub fn clear(&self) -> bool {
        self.begin_update(None).clear()
    }

    pub fn send_message(&self, handler: &str, args: Vec<Value>) {
        self.begin_update(None).send_message(handler, args);
    }

    pub fn set_dirty(&self, key: &str) {
        self.begin_update(None).set_dirty(key);
    }

    /// Send a status error to one listener without touching state
    pub fn return_error(&self, listener: ListenerHandle, status: &str) {
        self.begin_update(Some(listener)).return_error(status);
    }

    pub fn add_event_listener(&self, listener: ListenerHandle) {
        self.begin_update(Some(listener.clone()))
            .add_event_listener(listener);
    }

    /// Unsubscribe a listener; returns true if that released the object
    pub fn remove_event_listener(&self, listener: &ListenerHandle) -> bool {
        let mut tx = self.begin_update(None);
        tx.remove_event_listener(listener.id());
        tx.end()
    }

    /// Drop all state and subscribers
    pub fn close(&self) {
        self.object.lock().close();
        debug!(object = %self.name, "shared object closed");
    }

    /// Apply a message received from a peer
    ///
    /// All events run inside one update block owned by the message source,
    /// each behind its security check. Denied writes and deletes answer the
    /// source with the server's value and a `NoWriteAccess` status; denied
    /// connects answer with `NoReadAccess`; denied sends are dropped.
    pub fn dispatch_event(&self, message: &SharedObjectMessage) {
        let source = message.source().cloned();
        let parent = self.parent();
        let global = parent.as_deref().map(Scope::security);

        let mut tx = self.begin_update(source.clone());
        for event in message.events() {
            match event.kind() {
                EventKind::ServerConnect => {
                    if !check_chain(&self.security, global, |h| h.is_connection_allowed(&tx)) {
                        tx.return_error(status::NO_READ_ACCESS);
                    } else if let Some(source) = &source {
                        tx.add_event_listener(source.clone());
                    }
                }
                EventKind::ServerDisconnect => {
                    if let Some(source) = &source {
                        tx.remove_event_listener(source.id());
                    }
                }
                EventKind::ServerSetAttribute => {
                    let Some(key) = event.key() else {
                        warn!(object = %self.name, "set attribute without a key");
                        continue;
                    };
                    let value = event.value();
                    if !check_chain(&self.security, global, |h| h.is_write_allowed(&tx, key, value)) {
                        tx.return_attribute_value(key);
                        tx.return_error(status::NO_WRITE_ACCESS);
                    } else {
                        tx.set_attribute(key, value.cloned());
                    }
                }
                EventKind::ServerDeleteAttribute => {
                    let Some(key) = event.key() else {
                        warn!(object = %self.name, "delete attribute without a key");
                        continue;
                    };
                    if !check_chain(&self.security, global, |h| h.is_delete_allowed(&tx, key)) {
                        tx.return_attribute_value(key);
                        tx.return_error(status::NO_WRITE_ACCESS);
                    } else {
                        tx.remove_attribute(key);
                    }
                }
                EventKind::ServerSendMessage => {
                    let Some(handler) = event.key() else {
                        warn!(object = %self.name, "send message without a handler name");
                        continue;
                    };
                    let args = event.arguments();
                    if check_chain(&self.security, global, |h| h.is_send_allowed(&tx, handler, &args)) {
                        tx.send_message(handler, args);
                    }
                }
                other => {
                    warn!(object = %self.name, kind = %other, "unknown shared object event");
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers, handlers, security
    // ─────────────────────────────────────────────────────────────────────

    pub fn add_shared_object_listener(&self, listener: Arc<dyn SharedObjectListener>) {
        self.server_listeners.push(listener);
    }

    pub fn remove_shared_object_listener(&self, listener: &Arc<dyn SharedObjectListener>) -> bool {
        self.server_listeners
            .remove_where(|l| Arc::ptr_eq(l, listener))
    }

    /// Register a service handler; the empty name is the default service
    pub fn register_service_handler(&self, name: impl Into<String>, handler: Arc<dyn ServiceHandler>) {
        self.handlers.register(name, handler);
    }

    pub fn unregister_service_handler(&self, name: &str) -> bool {
        self.handlers.unregister(name)
    }

    pub fn service_handler(&self, name: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.handlers.get(name)
    }

    pub fn service_handler_names(&self) -> Vec<String> {
        self.handlers.names()
    }

    /// Security handlers specific to this object
    pub fn security(&self) -> &SecurityChain {
        &self.security
    }

    pub fn register_security(&self, handler: Arc<dyn SharedObjectSecurity>) {
        self.security.register(handler);
    }

    pub fn unregister_security(&self, handler: &Arc<dyn SharedObjectSecurity>) -> bool {
        self.security.unregister(handler)
    }

    fn notify(&self, pending: Vec<Notification>) {
        if pending.is_empty() {
            return;
        }
        let observers = self.server_listeners.snapshot();
        for notification in pending {
            match notification {
                Notification::Connect => {
                    for o in observers.iter() {
                        o.on_connect(self);
                    }
                }
                Notification::Disconnect => {
                    for o in observers.iter() {
                        o.on_disconnect(self);
                    }
                }
                Notification::Update { key, value } => {
                    for o in observers.iter() {
                        o.on_update(self, &key, value.as_ref());
                    }
                }
                Notification::UpdateAll(values) => {
                    for o in observers.iter() {
                        o.on_update_all(self, &values);
                    }
                }
                Notification::Delete(key) => {
                    for o in observers.iter() {
                        o.on_delete(self, &key);
                    }
                }
                Notification::Clear => {
                    for o in observers.iter() {
                        o.on_clear(self);
                    }
                }
                Notification::Send { handler, args } => {
                    self.invoke_service_handler(&handler, &args);
                    for o in observers.iter() {
                        o.on_send(self, &handler, &args);
                    }
                }
            }
        }
    }

    fn invoke_service_handler(&self, handler: &str, args: &[Value]) {
        let (service, method) = split_handler_name(handler);
        let target = self.handlers.get(service).or_else(|| {
            // Only a named service can be resolved by type name.
            if service.is_empty() {
                return None;
            }
            let type_name = format!("{}.{}", self.name, service);
            let resolved = self
                .parent()
                .and_then(|parent| parent.handler_resolver())
                .and_then(|resolver| resolver.resolve(&type_name));
            if resolved.is_none() {
                debug!(object = %self.name, %type_name, "no service handler");
            }
            resolved
        });
        let Some(target) = target else {
            return;
        };

        match target.invoke(method, args) {
            Ok(_) => debug!(object = %self.name, handler, "service handler invoked"),
            Err(HandlerError::UnknownMethod(_)) => {
                debug!(object = %self.name, service, method, "service has no such method")
            }
            Err(err) => {
                error!(object = %self.name, handler, %err, "service handler invocation failed")
            }
        }
    }
}

impl fmt::Debug for SharedObjectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObjectScope")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("version", &self.version())
            .field("persistent_object", &self.persistent_object)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// An open update on a [`SharedObjectScope`]
///
/// Derefs to the locked [`SharedObject`] for reads. Mutations go through the
/// guard's own methods so that observers hear about them after unlock.
pub struct UpdateGuard<'a> {
    scope: &'a SharedObjectScope,
    object: Option<MutexGuard<'a, SharedObject>>,
    pending: Vec<Notification>,
    /// A listener left during this update; release is decided on close
    disconnected: bool,
}

impl<'a> UpdateGuard<'a> {
    fn object(&mut self) -> &mut SharedObject {
        match self.object.as_deref_mut() {
            Some(object) => object,
            None => unreachable!("update guard used after release"),
        }
    }

    pub fn get_attribute(&mut self, key: &str, default: Value) -> Value {
        self.object().get(key, default)
    }

    pub fn set_attribute(&mut self, key: &str, value: Option<Value>) -> bool {
        let value = value.filter(|v| !v.is_null());
        let changed = self.object().set(key, value.clone());
        if changed {
            self.pending.push(Notification::Update {
                key: key.to_string(),
                value,
            });
        }
        changed
    }

    pub fn set_attributes(&mut self, values: BTreeMap<String, Value>) {
        let mut updated = BTreeMap::new();
        for (key, value) in self.object().set_attributes(values) {
            match value {
                Some(value) => {
                    updated.insert(key, value);
                }
                None => self.pending.push(Notification::Delete(key)),
            }
        }
        if !updated.is_empty() {
            self.pending.push(Notification::UpdateAll(updated));
        }
    }

    pub fn remove_attribute(&mut self, key: &str) -> bool {
        let removed = self.object().remove(key);
        if removed {
            self.pending.push(Notification::Delete(key.to_string()));
        }
        removed
    }

    pub fn remove_attributes(&mut self) {
        self.object().remove_all();
        self.pending.push(Notification::Clear);
    }

    pub fn clear(&mut self) -> bool {
        let cleared = self.object().clear();
        if cleared {
            self.pending.push(Notification::Clear);
        }
        cleared
    }

    pub fn send_message(&mut self, handler: &str, args: Vec<Value>) {
        self.object().send_message(handler, args.clone());
        self.pending.push(Notification::Send {
            handler: handler.to_string(),
            args,
        });
    }

    pub fn set_dirty(&mut self, key: &str) {
        self.object().set_dirty(key);
    }

    pub fn return_error(&mut self, status: &str) {
        self.object().return_error(status);
    }

    pub fn return_attribute_value(&mut self, key: &str) {
        self.object().return_attribute_value(key);
    }

    pub fn add_event_listener(&mut self, listener: ListenerHandle) {
        self.object().register(listener);
        self.pending.push(Notification::Connect);
    }

    /// Unsubscribe a listener; returns false if it was not subscribed
    ///
    /// Whether this releases the object is only decided when the update
    /// closes, so a listener joining later in the same update keeps it alive.
    pub fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let removed = self.object().remove_listener(id);
        self.disconnected = true;
        self.pending.push(Notification::Disconnect);
        removed
    }

    /// Close the update now; returns true if it released the object
    pub fn end(mut self) -> bool {
        self.close()
    }

    fn close(&mut self) -> bool {
        let Some(mut object) = self.object.take() else {
            return false;
        };
        object.end_update();

        // Detach while still locked so nobody can join the released object.
        let released = self.disconnected && object.check_release();
        if released {
            if let Some(parent) = self.scope.parent() {
                parent.remove_shared_object(self.scope);
            }
        }
        drop(object);

        let pending = mem::take(&mut self.pending);
        self.scope.notify(pending);
        released
    }
}

impl Deref for UpdateGuard<'_> {
    type Target = SharedObject;

    fn deref(&self) -> &SharedObject {
        match self.object.as_deref() {
            Some(object) => object,
            None => unreachable!("update guard used after release"),
        }
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
