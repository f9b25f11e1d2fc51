//! Service handlers invoked by `send_message`
//!
//! A message handler name of the form `service.method` is split at the last
//! dot. The service part selects a handler registered on the object (an
//! empty service name when there is no dot); the method part is passed to
//! [`ServiceHandler::invoke`] together with the message arguments.

use crate::error::{HandlerError, HandlerResult};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Target of `send_message` invocations
pub trait ServiceHandler: Send + Sync {
    fn invoke(&self, method: &str, args: &[Value]) -> HandlerResult<Value>;
}

/// Finds handlers for services nobody registered
///
/// Consulted with `"<objectName>.<serviceName>"` when a message names a
/// service that has no registered handler.
pub trait HandlerResolver: Send + Sync {
    fn resolve(&self, type_name: &str) -> Option<Arc<dyn ServiceHandler>>;
}

type Method = Box<dyn Fn(&[Value]) -> HandlerResult<Value> + Send + Sync>;

/// A service handler built from named closures
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Method>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[Value]) -> HandlerResult<Value> + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Box::new(f));
        self
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }
}

impl ServiceHandler for MethodRegistry {
    fn invoke(&self, method: &str, args: &[Value]) -> HandlerResult<Value> {
        match self.methods.get(method) {
            Some(f) => f(args),
            None => Err(HandlerError::UnknownMethod(method.to_string())),
        }
    }
}

/// Service handlers registered on one object, keyed by service name
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ServiceHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; the empty name is the default service
    pub fn register(&self, name: impl Into<String>, handler: Arc<dyn ServiceHandler>) {
        self.handlers.write().insert(name.into(), handler);
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.handlers.write().remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.handlers.read().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Split `service.method` at the last dot
pub fn split_handler_name(handler: &str) -> (&str, &str) {
    match handler.rfind('.') {
        Some(pos) => (&handler[..pos], &handler[pos + 1..]),
        None => ("", handler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_handler_name() {
        assert_eq!(split_handler_name("chat.post"), ("chat", "post"));
        assert_eq!(split_handler_name("a.b.c"), ("a.b", "c"));
        assert_eq!(split_handler_name("ping"), ("", "ping"));
    }

    #[test]
    fn test_method_registry_invokes_by_name() {
        let registry = MethodRegistry::new().method("add", |args| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        });

        assert_eq!(registry.invoke("add", &[json!(1), json!(2)]).unwrap(), json!(3));
        assert!(matches!(
            registry.invoke("sub", &[]),
            Err(HandlerError::UnknownMethod(m)) if m == "sub"
        ));
        assert_eq!(registry.method_names(), vec!["add".to_string()]);
    }

    #[test]
    fn test_handler_registry() {
        let registry = HandlerRegistry::new();
        registry.register("", Arc::new(MethodRegistry::new()));
        registry.register("chat", Arc::new(MethodRegistry::new()));

        assert!(registry.get("chat").is_some());
        assert_eq!(registry.names(), vec!["".to_string(), "chat".to_string()]);
        assert!(registry.unregister("chat"));
        assert!(registry.get("chat").is_none());
    }
}
