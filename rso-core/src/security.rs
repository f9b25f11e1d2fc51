//! Access control for shared objects
//!
//! A [`SecurityChain`] holds [`SharedObjectSecurity`] handlers. Every check
//! runs the object's own chain first and then the scope-wide chain; the
//! first handler that says no wins.

use crate::cow::CowVec;
use crate::object::SharedObject;
use serde_json::Value;
use std::sync::Arc;

/// Pluggable access checks
///
/// Every method defaults to allowing the operation, so implementors only
/// override what they restrict. Handlers run while the object is locked:
/// they get a read-only view of it and must not call back into its scope.
pub trait SharedObjectSecurity: Send + Sync {
    /// May the peer subscribe to the object
    fn is_connection_allowed(&self, object: &SharedObject) -> bool {
        let _ = object;
        true
    }

    /// May the peer write `value` to `key`
    fn is_write_allowed(&self, object: &SharedObject, key: &str, value: Option<&Value>) -> bool {
        let _ = (object, key, value);
        true
    }

    /// May the peer delete `key`
    fn is_delete_allowed(&self, object: &SharedObject, key: &str) -> bool {
        let _ = (object, key);
        true
    }

    /// May the peer send `handler(args)` through the object
    fn is_send_allowed(&self, object: &SharedObject, handler: &str, args: &[Value]) -> bool {
        let _ = (object, handler, args);
        true
    }
}

/// Ordered list of security handlers
#[derive(Default)]
pub struct SecurityChain {
    handlers: CowVec<Arc<dyn SharedObjectSecurity>>,
}

impl SecurityChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn SharedObjectSecurity>) {
        self.handlers.push(handler);
    }

    /// Remove a handler by identity; returns false if it was not registered
    pub fn unregister(&self, handler: &Arc<dyn SharedObjectSecurity>) -> bool {
        self.handlers.remove_where(|h| Arc::ptr_eq(h, handler))
    }

    pub fn handlers(&self) -> Arc<Vec<Arc<dyn SharedObjectSecurity>>> {
        self.handlers.snapshot()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// True when every handler allows the operation
    pub fn allows(&self, check: impl Fn(&dyn SharedObjectSecurity) -> bool) -> bool {
        self.handlers.snapshot().iter().all(|h| check(h.as_ref()))
    }
}

/// Run a check against the local chain, then the global one
pub(crate) fn check_chain(
    local: &SecurityChain,
    global: Option<&SecurityChain>,
    check: impl Fn(&dyn SharedObjectSecurity) -> bool,
) -> bool {
    if !local.allows(&check) {
        return false;
    }
    global.map_or(true, |chain| chain.allows(&check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    struct ReadOnly;

    impl SharedObjectSecurity for ReadOnly {
        fn is_write_allowed(&self, _: &SharedObject, _: &str, _: Option<&Value>) -> bool {
            false
        }
    }

    struct Counting(Arc<Mutex<u32>>);

    impl SharedObjectSecurity for Counting {
        fn is_write_allowed(&self, _: &SharedObject, _: &str, _: Option<&Value>) -> bool {
            *self.0.lock() += 1;
            true
        }
    }

    fn object() -> SharedObject {
        SharedObject::new("so", "/", false, None)
    }

    #[test]
    fn test_defaults_allow_everything() {
        struct Open;
        impl SharedObjectSecurity for Open {}

        let so = object();
        let open = Open;
        assert!(open.is_connection_allowed(&so));
        assert!(open.is_write_allowed(&so, "k", Some(&json!(1))));
        assert!(open.is_delete_allowed(&so, "k"));
        assert!(open.is_send_allowed(&so, "m", &[]));
    }

    #[test]
    fn test_first_denial_short_circuits() {
        let calls = Arc::new(Mutex::new(0));
        let local = SecurityChain::new();
        local.register(Arc::new(ReadOnly));
        let global = SecurityChain::new();
        global.register(Arc::new(Counting(calls.clone())));

        let so = object();
        let allowed = check_chain(&local, Some(&global), |h| h.is_write_allowed(&so, "k", None));
        assert!(!allowed);
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_global_chain_consulted_after_local() {
        let calls = Arc::new(Mutex::new(0));
        let local = SecurityChain::new();
        local.register(Arc::new(Counting(calls.clone())));
        let global = SecurityChain::new();
        global.register(Arc::new(ReadOnly));

        let so = object();
        assert!(!check_chain(&local, Some(&global), |h| h.is_write_allowed(&so, "k", None)));
        assert_eq!(*calls.lock(), 1);
        assert!(check_chain(&local, None, |h| h.is_write_allowed(&so, "k", None)));
    }

    #[test]
    fn test_unregister_by_identity() {
        let chain = SecurityChain::new();
        let handler: Arc<dyn SharedObjectSecurity> = Arc::new(ReadOnly);
        chain.register(handler.clone());
        chain.register(Arc::new(ReadOnly));

        assert!(chain.unregister(&handler));
        assert!(!chain.unregister(&handler));
        assert_eq!(chain.len(), 1);
    }
}
