//! Persistence stores for shared objects
//!
//! The engine only needs load/save/remove by name. Store failures are
//! returned as [`StoreError`](crate::error::StoreError) and logged by the
//! caller; they never hold up live synchronization.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Durable form of a shared object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedObject {
    pub name: String,
    pub path: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    1
}

/// Storage backend for shared objects of one scope
///
/// Implementations must be safe to call from several threads at once.
pub trait PersistenceStore: Send + Sync {
    /// Short name of the backend, for logs
    fn kind(&self) -> &'static str;

    /// Load a previously saved object
    fn load(&self, name: &str) -> StoreResult<Option<PersistedObject>>;

    /// Save (create or replace) an object
    fn save(&self, object: &PersistedObject) -> StoreResult<()>;

    /// Remove an object; returns false if nothing was stored
    fn remove(&self, name: &str) -> StoreResult<bool>;

    /// Names of all stored objects
    fn names(&self) -> StoreResult<Vec<String>>;
}
