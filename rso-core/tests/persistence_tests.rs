//! Shared objects backed by the file store

mod common;

use common::*;
use rso_core::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn file_service(tmp: &TempDir) -> SharedObjectService {
    SharedObjectService::new(ServiceConfig::default().with_file_store(tmp.path()))
}

#[test]
fn test_persistent_object_survives_restart() {
    let tmp = TempDir::new().unwrap();

    let version = {
        let service = file_service(&tmp);
        let room = Scope::root().resolve("/game/room1");
        let so = service.get_or_create(&room, "scores", true);
        let peer = joined(&so);
        peer_set(&so, &peer, "alice", Some(json!(10)));
        peer_set(&so, &peer, "bob", Some(json!(7)));
        so.version()
    };
    assert!(tmp.path().join("game/room1/scores.json").is_file());

    let service = file_service(&tmp);
    let room = Scope::root().resolve("/game/room1");
    let so = service.get_or_create(&room, "scores", true);

    assert_eq!(so.version(), version);
    assert_eq!(so.attribute("alice"), Some(json!(10)));
    assert_eq!(so.attribute("bob"), Some(json!(7)));
    assert!(so.is_persistent());
    assert_eq!(so.path(), "/game/room1");

    // Versions keep climbing from where they were.
    so.set_attribute("alice", Some(json!(11)));
    assert_eq!(so.version(), version + 1);
}

#[test]
fn test_transient_objects_never_touch_disk() {
    let tmp = TempDir::new().unwrap();
    let service = file_service(&tmp);
    let room = Scope::root().child("lobby");
    let so = service.get_or_create(&room, "chat", false);
    so.set_attribute("topic", Some(json!("hi")));

    assert!(!tmp.path().join("lobby/chat.json").exists());
}

/// Store whose writes always fail
struct BrokenStore;

impl PersistenceStore for BrokenStore {
    fn kind(&self) -> &'static str {
        "broken"
    }

    fn load(&self, _: &str) -> StoreResult<Option<PersistedObject>> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }

    fn save(&self, _: &PersistedObject) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }

    fn remove(&self, _: &str) -> StoreResult<bool> {
        Err(StoreError::Io(std::io::Error::other("disk on fire")))
    }

    fn names(&self) -> StoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

#[test]
fn test_store_failures_do_not_block_sync() {
    let root = Scope::root();
    let so = SharedObjectScope::new(&root, "fragile", true, Arc::new(BrokenStore));
    let a = joined(&so);
    let b = joined(&so);

    peer_set(&so, &a, "k", Some(json!(1)));

    assert_eq!(so.attribute("k"), Some(json!(1)));
    assert_eq!(so.version(), 2);
    assert!(!so.is_persistent());
    assert_eq!(kinds(&b.take()), vec![vec![EventKind::ClientUpdateData]]);
}
