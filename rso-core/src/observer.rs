//! Server-side observers of shared object changes

use crate::shared_scope::SharedObjectScope;
use serde_json::Value;
use std::collections::BTreeMap;

/// Callbacks fired after a change has been applied and the object unlocked
///
/// Observers may call back into the scope. All methods default to no-ops.
pub trait SharedObjectListener: Send + Sync {
    /// A listener subscribed
    fn on_connect(&self, so: &SharedObjectScope) {
        let _ = so;
    }

    /// A listener unsubscribed
    fn on_disconnect(&self, so: &SharedObjectScope) {
        let _ = so;
    }

    /// An attribute changed; `None` means it was deleted through a write
    fn on_update(&self, so: &SharedObjectScope, key: &str, value: Option<&Value>) {
        let _ = (so, key, value);
    }

    /// Several attributes were written in one update
    fn on_update_all(&self, so: &SharedObjectScope, values: &BTreeMap<String, Value>) {
        let _ = (so, values);
    }

    /// An attribute was deleted
    fn on_delete(&self, so: &SharedObjectScope, key: &str) {
        let _ = (so, key);
    }

    /// All attributes were dropped
    fn on_clear(&self, so: &SharedObjectScope) {
        let _ = so;
    }

    /// A message was sent through the object
    fn on_send(&self, so: &SharedObjectScope, handler: &str, args: &[Value]) {
        let _ = (so, handler, args);
    }
}
