//! Plain key/value attribute map

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute map without side effects
///
/// Keys iterate in sorted order, so bulk operations emit their events
/// deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeStore {
    values: BTreeMap<String, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Value for `key`, inserting `default` first if absent
    pub fn get_or_insert(&mut self, key: &str, default: Value) -> &Value {
        self.values.entry(key.to_string()).or_insert(default)
    }

    /// Store a value; returns true if the key is new or the value changed
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        match self.values.get(key) {
            Some(existing) if *existing == value => false,
            _ => {
                self.values.insert(key.to_string(), value);
                true
            }
        }
    }

    /// Returns true if the key was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Snapshot of the whole map
    pub fn to_map(&self) -> BTreeMap<String, Value> {
        self.values.clone()
    }

    /// The map as a single JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}
