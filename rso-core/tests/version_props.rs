//! Property tests for version monotonicity

mod common;

use common::*;
use proptest::prelude::*;
use rso_core::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Set(u8, Option<u8>),
    Remove(u8),
    Get(u8),
    Send,
    Batch(Vec<(u8, u8)>),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..4, proptest::option::of(0u8..3)).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..4).prop_map(Op::Remove),
        (0u8..4).prop_map(Op::Get),
        Just(Op::Send),
        proptest::collection::vec((0u8..4, 0u8..3), 0..4).prop_map(Op::Batch),
    ]
}

fn key(k: u8) -> String {
    format!("k{k}")
}

/// Apply `op` to the shadow map and report whether it counts as a change
fn expect_change(shadow: &mut BTreeMap<String, Value>, op: &Op) -> bool {
    match op {
        Op::Set(k, Some(v)) => shadow.insert(key(*k), json!(v)) != Some(json!(v)),
        Op::Set(k, None) | Op::Remove(k) => shadow.remove(&key(*k)).is_some(),
        Op::Get(k) => {
            let absent = !shadow.contains_key(&key(*k));
            shadow.entry(key(*k)).or_insert(json!(0));
            absent
        }
        Op::Send => true,
        Op::Batch(pairs) => {
            let mut changed = false;
            for (k, v) in pairs {
                changed |= shadow.insert(key(*k), json!(v)) != Some(json!(v));
            }
            changed
        }
    }
}

proptest! {
    #[test]
    fn version_bumps_exactly_once_per_changing_update(ops in proptest::collection::vec(op(), 1..40)) {
        let service = SharedObjectService::default();
        let room = Scope::root().child("props");
        let so = service.get_or_create(&room, "counter", true);
        let peer = joined(&so);
        let mut shadow = BTreeMap::new();

        for op in &ops {
            let before = so.version();
            let changed = expect_change(&mut shadow, op);
            {
                let mut tx = so.begin_update(Some(peer.handle()));
                match op {
                    Op::Set(k, v) => {
                        tx.set_attribute(&key(*k), v.map(|v| json!(v)));
                    }
                    Op::Remove(k) => {
                        tx.remove_attribute(&key(*k));
                    }
                    Op::Get(k) => {
                        tx.get_attribute(&key(*k), json!(0));
                    }
                    Op::Send => tx.send_message("noop", vec![]),
                    Op::Batch(pairs) => {
                        for (k, v) in pairs {
                            tx.set_attribute(&key(*k), Some(json!(v)));
                        }
                    }
                }
            }
            let after = so.version();
            prop_assert_eq!(after, before + u32::from(changed), "op {:?}", op);
        }

        prop_assert_eq!(so.attributes(), shadow);
    }

    #[test]
    fn observed_versions_strictly_increase(values in proptest::collection::vec(0u8..3, 1..30)) {
        let service = SharedObjectService::default();
        let room = Scope::root().child("props");
        let so = service.get_or_create(&room, "board", false);
        let writer = joined(&so);
        let reader = joined(&so);

        for v in values {
            peer_set(&so, &writer, "k", Some(json!(v)));
        }

        let versions: Vec<u32> = reader.take().iter().map(|m| m.version()).collect();
        prop_assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
