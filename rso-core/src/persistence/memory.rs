use super::{PersistedObject, PersistenceStore};
use crate::error::StoreResult;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-process store
///
/// Holds transient objects, and stands in for a persistent backend that
/// failed to start.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, PersistedObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl PersistenceStore for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn load(&self, name: &str) -> StoreResult<Option<PersistedObject>> {
        Ok(self.objects.read().get(name).cloned())
    }

    fn save(&self, object: &PersistedObject) -> StoreResult<()> {
        self.objects
            .write()
            .insert(object.name.clone(), object.clone());
        Ok(())
    }

    fn remove(&self, name: &str) -> StoreResult<bool> {
        Ok(self.objects.write().remove(name).is_some())
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.objects.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn object(name: &str) -> PersistedObject {
        let mut attributes = BTreeMap::new();
        attributes.insert("k".to_string(), json!("v"));
        PersistedObject {
            name: name.to_string(),
            path: "/app".to_string(),
            version: 4,
            attributes,
        }
    }

    #[test]
    fn test_save_load_remove() {
        let store = MemoryStore::new();
        assert!(store.load("a").unwrap().is_none());

        store.save(&object("a")).unwrap();
        assert_eq!(store.load("a").unwrap(), Some(object("a")));
        assert_eq!(store.names().unwrap(), vec!["a".to_string()]);

        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert!(store.is_empty());
    }
}
