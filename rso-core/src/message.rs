//! Shared object messages: versioned batches of events

use crate::event::{EventKind, SharedObjectEvent};
use crate::listener::ListenerHandle;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered batch of events for one object
///
/// Outbound messages are built once per flush and handed to channels
/// behind an `Arc`, so nothing can change them after they are sent.
/// Inbound messages carry the `source` listener that issued them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedObjectMessage {
    name: String,
    #[serde(default)]
    version: u32,
    #[serde(default)]
    persistent: bool,
    #[serde(default)]
    events: Vec<SharedObjectEvent>,
    #[serde(skip)]
    source: Option<ListenerHandle>,
}

impl SharedObjectMessage {
    pub fn new(name: impl Into<String>, version: u32, persistent: bool) -> Self {
        Self {
            name: name.into(),
            version,
            persistent,
            events: Vec::new(),
            source: None,
        }
    }

    /// Attach the events of this batch
    pub fn with_events(mut self, events: impl IntoIterator<Item = SharedObjectEvent>) -> Self {
        self.events.extend(events);
        self
    }

    /// Attach the listener that sent this message
    pub fn with_source(mut self, source: ListenerHandle) -> Self {
        self.source = Some(source);
        self
    }

    /// Append one event while building the batch
    pub fn push(&mut self, kind: EventKind, key: Option<String>, value: Option<Value>) {
        self.events.push(SharedObjectEvent::new(kind, key, value));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn events(&self) -> &[SharedObjectEvent] {
        &self.events
    }

    pub fn source(&self) -> Option<&ListenerHandle> {
        self.source.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Kinds of the contained events, in order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.iter().map(SharedObjectEvent::kind).collect()
    }
}
