//! Per-socket protocol handling, independent of the socket itself.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rso_core::{status, EventKind, Scope, SharedObjectMessage, SharedObjectService};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::connection::WsConnection;

/// Resolve a client supplied scope path below `root`.
///
/// Empty segments are skipped; `.` and `..` are rejected so a scope path can
/// always double as a store directory.
pub fn scope_for(root: &Arc<Scope>, raw: &str) -> Result<Arc<Scope>> {
    let mut scope = Arc::clone(root);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(anyhow!("invalid scope segment: {segment}"));
        }
        scope = scope.child(segment);
    }
    Ok(scope)
}

/// One client attached to one scope
pub struct Session {
    service: Arc<SharedObjectService>,
    scope: Arc<Scope>,
    connection: Arc<WsConnection>,
}

impl Session {
    pub fn open(
        service: Arc<SharedObjectService>,
        scope: Arc<Scope>,
    ) -> (Self, mpsc::UnboundedReceiver<Arc<SharedObjectMessage>>) {
        let (connection, rx) = WsConnection::new();
        (
            Self {
                service,
                scope,
                connection,
            },
            rx,
        )
    }

    pub fn connection(&self) -> &Arc<WsConnection> {
        &self.connection
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Decode a text frame and apply it
    pub fn handle_frame(&self, text: &str) -> Result<()> {
        let message: SharedObjectMessage =
            serde_json::from_str(text).context("decoding shared object message")?;
        self.handle_message(message);
        Ok(())
    }

    /// Apply one inbound message on behalf of this client
    ///
    /// Only a connect request creates a missing object. A request whose
    /// persistence flag disagrees with the existing object is answered with
    /// `BadPersistence` and otherwise ignored.
    pub fn handle_message(&self, message: SharedObjectMessage) {
        let name = message.name().to_string();
        let connecting = message
            .events()
            .iter()
            .any(|event| event.kind() == EventKind::ServerConnect);

        let so = if connecting {
            self.service
                .get_or_create(&self.scope, &name, message.is_persistent())
        } else {
            match self.service.get_shared_object(&self.scope, &name) {
                Some(so) => so,
                None => {
                    debug!(scope = %self.scope.path(), object = %name, "message for unknown shared object");
                    return;
                }
            }
        };

        let handle = self.connection.handle();
        if so.is_persistent_object() != message.is_persistent() {
            warn!(
                scope = %self.scope.path(),
                object = %name,
                requested = message.is_persistent(),
                "persistence flag mismatch"
            );
            so.return_error(handle, status::BAD_PERSISTENCE);
            return;
        }

        so.dispatch_event(&message.with_source(handle));
        self.connection.sync_membership(&so);
    }

    /// Leave every joined object
    pub fn close(&self) {
        self.connection.close();
    }
}
