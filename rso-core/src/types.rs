//! Identity types shared across the engine

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of one subscribed listener
///
/// Listener handles compare and hash by this id, so two handles wrapping
/// the same peer are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub Uuid);

impl ListenerId {
    /// Create a new unique listener id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a listener id from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l:{}", &self.0.to_string()[..8])
    }
}

/// Status codes returned to peers in `CLIENT_STATUS` events
pub mod status {
    /// The peer may not read (connect to) the object
    pub const NO_READ_ACCESS: &str = "SharedObject.NoReadAccess";
    /// The peer may not write or delete the attribute
    pub const NO_WRITE_ACCESS: &str = "SharedObject.NoWriteAccess";
    /// The persistence flag of the request did not match the object
    pub const BAD_PERSISTENCE: &str = "SharedObject.BadPersistence";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_id_display_is_short() {
        let id = ListenerId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("l:"));
        assert_eq!(shown.len(), 10);
    }

    #[test]
    fn test_listener_ids_are_unique() {
        assert_ne!(ListenerId::new(), ListenerId::new());
    }
}
