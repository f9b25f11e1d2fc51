//! Shared object registry
//!
//! [`SharedObjectService`] creates and finds shared objects per scope and
//! picks their store: one in-memory store per scope for transient objects,
//! one configured persistent store per scope for the others.

use crate::config::{PersistenceConfig, ServiceConfig};
use crate::persistence::{FileStore, MemoryStore, PersistenceStore};
use crate::scope::Scope;
use crate::shared_scope::SharedObjectScope;
use std::sync::Arc;
use tracing::{debug, error};

/// Creates and locates shared objects
#[derive(Debug, Clone, Default)]
pub struct SharedObjectService {
    config: ServiceConfig,
}

impl SharedObjectService {
    pub fn new(config: ServiceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Get the object `name` under `scope`, creating it if needed
    ///
    /// An existing object is returned as is; `persistent` only matters
    /// when the object is created.
    pub fn get_or_create(
        &self,
        scope: &Arc<Scope>,
        name: &str,
        persistent: bool,
    ) -> Arc<SharedObjectScope> {
        scope.shared_object_or_insert_with(name, || {
            let store = self.store(scope, persistent);
            debug!(scope = %scope.path(), object = name, persistent, store = store.kind(), "creating shared object");
            Arc::new(SharedObjectScope::new(scope, name, persistent, store))
        })
    }

    pub fn get_shared_object(&self, scope: &Scope, name: &str) -> Option<Arc<SharedObjectScope>> {
        scope.shared_object(name)
    }

    pub fn has_shared_object(&self, scope: &Scope, name: &str) -> bool {
        scope.has_shared_object(name)
    }

    pub fn shared_object_names(&self, scope: &Scope) -> Vec<String> {
        scope.shared_object_names()
    }

    /// Clear an existing object; false if there is none
    pub fn clear_shared_objects(&self, scope: &Scope, name: &str) -> bool {
        match scope.shared_object(name) {
            Some(so) => so.clear(),
            None => false,
        }
    }

    /// Store used for objects of `scope`, built once and cached on it
    pub fn store(&self, scope: &Scope, persistent: bool) -> Arc<dyn PersistenceStore> {
        if !persistent {
            return scope.cached_store(false, || Arc::new(MemoryStore::new()));
        }
        scope.cached_store(true, || self.build_persistent_store(scope))
    }

    fn build_persistent_store(&self, scope: &Scope) -> Arc<dyn PersistenceStore> {
        match &self.config.persistence {
            PersistenceConfig::Memory => Arc::new(MemoryStore::new()),
            PersistenceConfig::File { root } => match FileStore::new(root, scope.path()) {
                Ok(store) => Arc::new(store),
                Err(err) => {
                    error!(scope = %scope.path(), root = %root.display(), %err, "could not open file store, falling back to memory");
                    Arc::new(MemoryStore::new())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let service = SharedObjectService::default();
        let root = Scope::root();

        let a = service.get_or_create(&root, "board", false);
        let b = service.get_or_create(&root, "board", true);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!b.is_persistent_object());
        assert!(service.has_shared_object(&root, "board"));
        assert_eq!(service.shared_object_names(&root), vec!["board".to_string()]);
    }

    #[test]
    fn test_stores_cached_per_scope_and_kind() {
        let service = SharedObjectService::default();
        let root = Scope::root();
        let other = root.child("other");

        let t1 = service.store(&root, false);
        let t2 = service.store(&root, false);
        let p1 = service.store(&root, true);
        let t3 = service.store(&other, false);

        assert!(Arc::ptr_eq(&t1, &t2));
        assert!(!Arc::ptr_eq(&t1, &p1));
        assert!(!Arc::ptr_eq(&t1, &t3));
    }

    #[test]
    fn test_file_store_selected_for_persistent() {
        let tmp = TempDir::new().unwrap();
        let service = SharedObjectService::new(ServiceConfig::default().with_file_store(tmp.path()));
        let root = Scope::root();
        let room = root.resolve("/game/room1");

        assert_eq!(service.store(&room, true).kind(), "file");
        assert_eq!(service.store(&room, false).kind(), "memory");
    }

    #[test]
    fn test_unusable_file_root_falls_back_to_memory() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();

        let service = SharedObjectService::new(ServiceConfig::default().with_file_store(&blocker));
        let root = Scope::root();
        let room = root.child("room");
        assert_eq!(service.store(&room, true).kind(), "memory");
    }

    #[test]
    fn test_clear_missing_object() {
        let service = SharedObjectService::default();
        let root = Scope::root();
        assert!(!service.clear_shared_objects(&root, "nope"));
    }
}
