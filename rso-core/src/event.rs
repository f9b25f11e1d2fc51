//! Shared object events
//!
//! An event is the atomic unit of change: a kind, an optional key and an
//! optional value. Peers send `Server*` kinds; the engine answers with
//! `Client*` kinds.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a shared object event
///
/// The numeric codes are the ones carried on the wire by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Peer subscribes to the object
    ServerConnect,
    /// Peer unsubscribes from the object
    ServerDisconnect,
    /// Peer writes an attribute
    ServerSetAttribute,
    /// An attribute value changed (or the full map, when the key is absent)
    ClientUpdateData,
    /// Acknowledges an attribute write from this peer
    ClientUpdateAttribute,
    /// Peer broadcasts a message to the other subscribers
    ServerSendMessage,
    /// Status or error report
    ClientStatus,
    /// All attributes were dropped
    ClientClearData,
    /// An attribute was deleted
    ClientDeleteData,
    /// Peer deletes an attribute
    ServerDeleteAttribute,
    /// First event a new subscriber receives
    ClientInitialData,
    /// A message broadcast by a peer or the server
    ClientSendMessage,
}

impl EventKind {
    /// Wire code of this kind
    pub fn code(self) -> u8 {
        match self {
            EventKind::ServerConnect => 0x01,
            EventKind::ServerDisconnect => 0x02,
            EventKind::ServerSetAttribute => 0x03,
            EventKind::ClientUpdateData => 0x04,
            EventKind::ClientUpdateAttribute => 0x05,
            EventKind::ServerSendMessage => 0x06,
            EventKind::ClientStatus => 0x07,
            EventKind::ClientClearData => 0x08,
            EventKind::ClientDeleteData => 0x09,
            EventKind::ServerDeleteAttribute => 0x0a,
            EventKind::ClientInitialData => 0x0b,
            EventKind::ClientSendMessage => 0x0c,
        }
    }

    /// Kind for a wire code
    pub fn from_code(code: u8) -> Option<Self> {
        let kind = match code {
            0x01 => EventKind::ServerConnect,
            0x02 => EventKind::ServerDisconnect,
            0x03 => EventKind::ServerSetAttribute,
            0x04 => EventKind::ClientUpdateData,
            0x05 => EventKind::ClientUpdateAttribute,
            0x06 => EventKind::ServerSendMessage,
            0x07 => EventKind::ClientStatus,
            0x08 => EventKind::ClientClearData,
            0x09 => EventKind::ClientDeleteData,
            0x0a => EventKind::ServerDeleteAttribute,
            0x0b => EventKind::ClientInitialData,
            0x0c => EventKind::ClientSendMessage,
            _ => return None,
        };
        Some(kind)
    }

    /// True for kinds a peer sends to the server
    pub fn is_inbound(self) -> bool {
        matches!(
            self,
            EventKind::ServerConnect
                | EventKind::ServerDisconnect
                | EventKind::ServerSetAttribute
                | EventKind::ServerDeleteAttribute
                | EventKind::ServerSendMessage
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::ServerConnect => "SERVER_CONNECT",
            EventKind::ServerDisconnect => "SERVER_DISCONNECT",
            EventKind::ServerSetAttribute => "SERVER_SET_ATTRIBUTE",
            EventKind::ClientUpdateData => "CLIENT_UPDATE_DATA",
            EventKind::ClientUpdateAttribute => "CLIENT_UPDATE_ATTRIBUTE",
            EventKind::ServerSendMessage => "SERVER_SEND_MESSAGE",
            EventKind::ClientStatus => "CLIENT_STATUS",
            EventKind::ClientClearData => "CLIENT_CLEAR_DATA",
            EventKind::ClientDeleteData => "CLIENT_DELETE_DATA",
            EventKind::ServerDeleteAttribute => "SERVER_DELETE_ATTRIBUTE",
            EventKind::ClientInitialData => "CLIENT_INITIAL_DATA",
            EventKind::ClientSendMessage => "CLIENT_SEND_MESSAGE",
        };
        f.write_str(name)
    }
}

/// One change to a shared object
///
/// Immutable once built. `value` is `None` for "no value"; a JSON `null`
/// is folded into `None` on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedObjectEvent {
    kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl SharedObjectEvent {
    pub fn new(kind: EventKind, key: Option<String>, value: Option<Value>) -> Self {
        Self {
            kind,
            key,
            value: value.filter(|v| !v.is_null()),
        }
    }

    /// Event with a key and no value
    pub fn keyed(kind: EventKind, key: impl Into<String>) -> Self {
        Self::new(kind, Some(key.into()), None)
    }

    /// Event with neither key nor value
    pub fn bare(kind: EventKind) -> Self {
        Self::new(kind, None, None)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Arguments of a send-message event
    ///
    /// An array value is spread into its elements; any other value becomes
    /// a single argument.
    pub fn arguments(&self) -> Vec<Value> {
        match &self.value {
            Some(Value::Array(items)) => items.clone(),
            Some(other) => vec![other.clone()],
            None => Vec::new(),
        }
    }
}

impl fmt::Display for SharedObjectEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(key) = &self.key {
            write!(f, " {key}")?;
        }
        if let Some(value) = &self.value {
            write!(f, " = {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_codes_are_bijective() {
        for code in 0x01..=0x0c {
            let kind = EventKind::from_code(code).unwrap();
            assert_eq!(kind.code(), code);
        }
        assert_eq!(EventKind::from_code(0), None);
        assert_eq!(EventKind::from_code(0x0d), None);
    }

    #[test]
    fn test_inbound_kinds() {
        assert!(EventKind::ServerConnect.is_inbound());
        assert!(EventKind::ServerSendMessage.is_inbound());
        assert!(!EventKind::ClientUpdateData.is_inbound());
        assert!(!EventKind::ClientStatus.is_inbound());
    }

    #[test]
    fn test_null_value_is_no_value() {
        let event = SharedObjectEvent::new(
            EventKind::ServerSetAttribute,
            Some("k".into()),
            Some(Value::Null),
        );
        assert_eq!(event.value(), None);
    }

    #[test]
    fn test_json_shape() {
        let event = SharedObjectEvent::new(
            EventKind::ClientUpdateData,
            Some("color".into()),
            Some(json!("red")),
        );
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(
            encoded,
            json!({"kind": "CLIENT_UPDATE_DATA", "key": "color", "value": "red"})
        );

        let decoded: SharedObjectEvent =
            serde_json::from_str(r#"{"kind":"SERVER_DELETE_ATTRIBUTE","key":"x","value":null}"#)
                .unwrap();
        assert_eq!(decoded.kind(), EventKind::ServerDeleteAttribute);
        assert_eq!(decoded.key(), Some("x"));
        assert_eq!(decoded.value(), None);
    }

    #[test]
    fn test_arguments_spread_arrays() {
        let event = SharedObjectEvent::new(
            EventKind::ServerSendMessage,
            Some("chat.post".into()),
            Some(json!(["hi", 2])),
        );
        assert_eq!(event.arguments(), vec![json!("hi"), json!(2)]);

        let single = SharedObjectEvent::new(
            EventKind::ServerSendMessage,
            Some("ping".into()),
            Some(json!(1)),
        );
        assert_eq!(single.arguments(), vec![json!(1)]);
    }
}
