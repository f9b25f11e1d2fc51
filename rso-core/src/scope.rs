//! Application scope tree
//!
//! Shared objects live under a [`Scope`]. A scope knows its children, the
//! shared objects it owns, the scope-wide security handlers, an optional
//! service-handler resolver, and the persistence stores cached for it.

use crate::handler::HandlerResolver;
use crate::persistence::PersistenceStore;
use crate::security::{SecurityChain, SharedObjectSecurity};
use crate::shared_scope::SharedObjectScope;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// A node in the application scope tree
pub struct Scope {
    name: String,
    path: String,
    parent: Option<Weak<Scope>>,
    children: RwLock<HashMap<String, Arc<Scope>>>,
    shared_objects: RwLock<HashMap<String, Arc<SharedObjectScope>>>,
    security: SecurityChain,
    resolver: RwLock<Option<Arc<dyn HandlerResolver>>>,
    transient_store: Mutex<Option<Arc<dyn PersistenceStore>>>,
    persistent_store: Mutex<Option<Arc<dyn PersistenceStore>>>,
}

impl Scope {
    fn with_parent(name: String, parent: Option<&Arc<Scope>>) -> Self {
        let path = match parent {
            Some(parent) if parent.path != "/" => format!("{}/{}", parent.path, name),
            _ => format!("/{name}"),
        };
        Self {
            name,
            path,
            parent: parent.map(Arc::downgrade),
            children: RwLock::new(HashMap::new()),
            shared_objects: RwLock::new(HashMap::new()),
            security: SecurityChain::new(),
            resolver: RwLock::new(None),
            transient_store: Mutex::new(None),
            persistent_store: Mutex::new(None),
        }
    }

    /// Create a root scope (path `/`)
    ///
    /// Children hold only a weak link upwards, so keep the root alive for as
    /// long as ancestors need to be reachable.
    pub fn root() -> Arc<Self> {
        Arc::new(Self::with_parent(String::new(), None))
    }

    /// Get or create a direct child
    pub fn child(self: &Arc<Self>, name: &str) -> Arc<Scope> {
        if let Some(child) = self.children.read().get(name) {
            return Arc::clone(child);
        }
        let mut children = self.children.write();
        Arc::clone(children.entry(name.to_string()).or_insert_with(|| {
            debug!(parent = %self.path, child = name, "creating scope");
            Arc::new(Self::with_parent(name.to_string(), Some(self)))
        }))
    }

    pub fn get_child(&self, name: &str) -> Option<Arc<Scope>> {
        self.children.read().get(name).cloned()
    }

    pub fn child_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.children.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Walk (creating as needed) a `/`-separated path below this scope
    pub fn resolve(self: &Arc<Self>, path: &str) -> Arc<Scope> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(Arc::clone(self), |scope, segment| scope.child(segment))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Arc<Scope>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Context path of this scope, always starting with `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shared objects
    // ─────────────────────────────────────────────────────────────────────

    pub fn shared_object(&self, name: &str) -> Option<Arc<SharedObjectScope>> {
        self.shared_objects.read().get(name).cloned()
    }

    pub fn has_shared_object(&self, name: &str) -> bool {
        self.shared_objects.read().contains_key(name)
    }

    pub fn shared_object_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shared_objects.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn shared_objects(&self) -> Vec<Arc<SharedObjectScope>> {
        self.shared_objects.read().values().cloned().collect()
    }

    pub(crate) fn shared_object_or_insert_with(
        &self,
        name: &str,
        create: impl FnOnce() -> Arc<SharedObjectScope>,
    ) -> Arc<SharedObjectScope> {
        if let Some(existing) = self.shared_objects.read().get(name) {
            return Arc::clone(existing);
        }
        let mut objects = self.shared_objects.write();
        Arc::clone(objects.entry(name.to_string()).or_insert_with(create))
    }

    /// Detach a shared object, if it is still the one registered under its name
    pub(crate) fn remove_shared_object(&self, so: &SharedObjectScope) -> bool {
        let mut objects = self.shared_objects.write();
        let is_current = objects
            .get(so.name())
            .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), so));
        if is_current {
            objects.remove(so.name());
            debug!(scope = %self.path(), object = so.name(), "shared object detached");
        }
        is_current
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope-wide services
    // ─────────────────────────────────────────────────────────────────────

    /// Security handlers applied to every shared object of this scope
    pub fn security(&self) -> &SecurityChain {
        &self.security
    }

    pub fn register_security(&self, handler: Arc<dyn SharedObjectSecurity>) {
        self.security.register(handler);
    }

    pub fn unregister_security(&self, handler: &Arc<dyn SharedObjectSecurity>) -> bool {
        self.security.unregister(handler)
    }

    pub fn set_handler_resolver(&self, resolver: Option<Arc<dyn HandlerResolver>>) {
        *self.resolver.write() = resolver;
    }

    /// Resolver of this scope, or of the nearest ancestor that has one
    pub fn handler_resolver(&self) -> Option<Arc<dyn HandlerResolver>> {
        if let Some(resolver) = self.resolver.read().clone() {
            return Some(resolver);
        }
        self.parent().and_then(|parent| parent.handler_resolver())
    }

    /// Store cached for this scope, built by `init` on first use
    pub(crate) fn cached_store(
        &self,
        persistent: bool,
        init: impl FnOnce() -> Arc<dyn PersistenceStore>,
    ) -> Arc<dyn PersistenceStore> {
        let slot = if persistent {
            &self.persistent_store
        } else {
            &self.transient_store
        };
        let mut slot = slot.lock();
        Arc::clone(slot.get_or_insert_with(init))
    }

    /// Close every shared object below this scope and forget them
    pub fn teardown(&self) {
        let objects: Vec<_> = self.shared_objects.write().drain().map(|(_, so)| so).collect();
        for so in objects {
            so.close();
        }
        let children: Vec<_> = self.children.write().drain().map(|(_, child)| child).collect();
        for child in children {
            child.teardown();
        }
        debug!(scope = %self.path(), "scope torn down");
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("path", &self.path())
            .field("children", &self.child_names())
            .field("shared_objects", &self.shared_object_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_paths() {
        let root = Scope::root();
        assert_eq!(root.path(), "/");

        let room = root.resolve("/game/room1");
        assert_eq!(room.path(), "/game/room1");
        assert_eq!(room.name(), "room1");
        assert_eq!(room.parent().unwrap().path(), "/game");
    }

    #[test]
    fn test_child_is_get_or_create() {
        let root = Scope::root();
        let a = root.child("app");
        let b = root.child("app");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(root.child_names(), vec!["app".to_string()]);
        assert!(Arc::ptr_eq(&root.resolve("app"), &a));
    }

    #[test]
    fn test_store_cache_per_kind() {
        let root = Scope::root();
        let transient = root.cached_store(false, || Arc::new(MemoryStore::new()));
        let again = root.cached_store(false, || panic!("store rebuilt"));
        assert!(Arc::ptr_eq(&transient, &again));

        let persistent = root.cached_store(true, || Arc::new(MemoryStore::new()));
        assert!(!Arc::ptr_eq(&transient, &persistent));
    }

    #[test]
    fn test_resolver_inherited_from_ancestor() {
        struct Nothing;
        impl HandlerResolver for Nothing {
            fn resolve(&self, _: &str) -> Option<Arc<dyn crate::handler::ServiceHandler>> {
                None
            }
        }

        let root = Scope::root();
        let room = root.resolve("/game/room1");
        assert!(room.handler_resolver().is_none());
        root.set_handler_resolver(Some(Arc::new(Nothing)));
        assert!(room.handler_resolver().is_some());
    }
}
