//! rso-core - Remote shared object synchronization engine
//!
//! A remote shared object is a named, versioned key/value map that many
//! connected peers subscribe to and mutate. Every change is seen by every
//! other subscriber in commit order, while the peer that made it gets an
//! acknowledgement of its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    SharedObjectService                        │
//! │        (get_or_create per scope, picks and caches stores)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │   Scope "/"  ──►  Scope "/game"  ──►  Scope "/game/room1"     │
//! │                                        │                     │
//! │                                        ▼                     │
//! │                        ┌───────────────────────────────┐     │
//! │                        │      SharedObjectScope        │     │
//! │                        │  mutex · security · handlers  │     │
//! │                        │  ┌─────────────────────────┐  │     │
//! │                        │  │      SharedObject       │  │     │
//! │                        │  │ attributes · version    │  │     │
//! │                        │  │ owner / broadcast queue │  │     │
//! │                        │  └────────────┬────────────┘  │     │
//! │                        └───────────────┼───────────────┘     │
//! │                                        ▼                     │
//! │                 Channel::write(SharedObjectMessage)          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Updates
//!
//! Mutations happen inside an update block. Blocks nest; only the
//! outermost `end_update` flushes. A flush bumps the version once if
//! anything changed, saves the object, sends the queued owner events to
//! the peer that started the update and the broadcast events to everyone
//! else.
//!
//! ## Scopes
//!
//! A [`SharedObjectScope`] holds the one mutex of its object and runs the
//! security chain before each peer request. Observers and service handlers
//! run after the mutex is released.
//!
//! ## Persistence
//!
//! Transient objects sit in a per-scope [`MemoryStore`] and vanish when the
//! last subscriber leaves. Persistent ones go to the configured store
//! ([`MemoryStore`] or [`FileStore`]). Store errors are logged, never fatal.
//!
//! # Example
//!
//! ```rust
//! use rso_core::{CollectingListener, Scope, SharedObjectService};
//! use serde_json::json;
//!
//! let service = SharedObjectService::default();
//! let room = Scope::root().resolve("/game/room1");
//! let board = service.get_or_create(&room, "board", false);
//!
//! let peer = CollectingListener::new();
//! board.add_event_listener(peer.handle());
//! board.set_attribute("color", Some(json!("red")));
//!
//! assert_eq!(board.version(), 2);
//! assert_eq!(peer.messages().len(), 2);
//! ```

pub mod attributes;
pub mod config;
pub mod cow;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
pub mod message;
pub mod object;
pub mod observer;
pub mod persistence;
pub mod scope;
pub mod security;
pub mod service;
pub mod shared_scope;
pub mod types;

pub use attributes::AttributeStore;
pub use config::{PersistenceConfig, ServiceConfig};
pub use error::{ConfigError, HandlerError, HandlerResult, StoreError, StoreResult};
pub use event::{EventKind, SharedObjectEvent};
pub use handler::{split_handler_name, HandlerResolver, MethodRegistry, ServiceHandler};
pub use listener::{
    Channel, CollectingChannel, CollectingListener, Connection, EventListener, ListenerHandle,
    ListenerSet, SHARED_OBJECT_CHANNEL,
};
pub use message::SharedObjectMessage;
pub use object::{ObjectStats, SharedObject};
pub use observer::SharedObjectListener;
pub use persistence::{FileStore, MemoryStore, PersistedObject, PersistenceStore};
pub use scope::Scope;
pub use security::{SecurityChain, SharedObjectSecurity};
pub use service::SharedObjectService;
pub use shared_scope::{SharedObjectScope, UpdateGuard};
pub use types::{status, ListenerId};
