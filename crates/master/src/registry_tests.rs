// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sloth_core::{FakeClock, HEARTBEAT_STALE_MS};
use std::time::Duration;

fn registry(dir: &std::path::Path) -> (Registry<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    let store = Arc::new(Store::open(dir).unwrap());
    (Registry::new(store, clock.clone()), clock)
}

#[test]
fn register_then_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _clock) = registry(dir.path());

    registry.register("a1", "10.0.0.1:7011", "0.1.0", serde_json::Value::Null).unwrap();
    assert_eq!(registry.resolve("a1"), Resolution::Address("10.0.0.1:7011".to_string()));
    assert_eq!(registry.resolve("ghost"), Resolution::NotFound);
}

#[test]
fn registration_is_idempotent_for_same_name_and_address() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, clock) = registry(dir.path());

    registry.register("a1", "10.0.0.1:7011", "0.1.0", serde_json::Value::Null).unwrap();
    clock.advance(Duration::from_secs(10));
    registry.register("a1", "10.0.0.1:7011", "0.1.0", serde_json::Value::Null).unwrap();

    let agents = registry.list(None);
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].address, "10.0.0.1:7011");
    assert_eq!(agents[0].status, "active");
}

#[test]
fn heartbeat_unknown_agent_reports_false() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _clock) = registry(dir.path());
    assert!(!registry.heartbeat("ghost").unwrap());

    registry.register("a1", "addr", "0.1.0", serde_json::Value::Null).unwrap();
    assert!(registry.heartbeat("a1").unwrap());
}

#[test]
fn sweep_flips_stale_agents_and_resolution_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, clock) = registry(dir.path());
    registry.register("fresh", "a:1", "0.1.0", serde_json::Value::Null).unwrap();
    registry.register("stale", "a:2", "0.1.0", serde_json::Value::Null).unwrap();

    clock.advance(Duration::from_millis(HEARTBEAT_STALE_MS / 2));
    registry.heartbeat("fresh").unwrap();
    clock.advance(Duration::from_millis(HEARTBEAT_STALE_MS / 2 + 1));

    let flipped = registry.sweep().unwrap();
    assert_eq!(flipped, vec!["stale".to_string()]);
    assert_eq!(registry.resolve("stale"), Resolution::Inactive);
    assert_eq!(registry.resolve("fresh"), Resolution::Address("a:1".to_string()));

    // Idempotent: a second sweep flips nothing new.
    assert!(registry.sweep().unwrap().is_empty());
}

#[test]
fn heartbeat_reactivates_after_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, clock) = registry(dir.path());
    registry.register("a1", "a:1", "0.1.0", serde_json::Value::Null).unwrap();
    clock.advance(Duration::from_millis(HEARTBEAT_STALE_MS + 1));
    registry.sweep().unwrap();
    assert_eq!(registry.resolve("a1"), Resolution::Inactive);

    registry.heartbeat("a1").unwrap();
    assert!(matches!(registry.resolve("a1"), Resolution::Address(_)));
}

#[test]
fn list_filters_by_status() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _clock) = registry(dir.path());
    registry.register("a1", "a:1", "0.1.0", serde_json::Value::Null).unwrap();
    registry.register("a2", "a:2", "0.1.0", serde_json::Value::Null).unwrap();
    registry.mark_inactive("a2", "testing").unwrap();

    assert_eq!(registry.list(None).len(), 2);
    let active = registry.list(Some(AgentStatus::Active));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "a1");
    assert_eq!(registry.list(Some(AgentStatus::Inactive)).len(), 1);
}

#[test]
fn remove_deletes_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let (registry, _clock) = registry(dir.path());
    registry.register("a1", "a:1", "0.1.0", serde_json::Value::Null).unwrap();

    assert!(registry.remove("a1").unwrap());
    assert!(!registry.remove("a1").unwrap());
    assert_eq!(registry.resolve("a1"), Resolution::NotFound);
}
