// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sloth_core::AgentRecord;

fn state_with_agent() -> StoreState {
    let mut state = StoreState::default();
    let record = AgentRecord::new("a1", "127.0.0.1:7011", "0.1.0", serde_json::Value::Null, 5);
    state.agents.insert(record.name.clone(), record);
    state
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snap");

    Snapshot::new(42, state_with_agent()).save(&path).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 42);
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert!(loaded.state.agents.contains_key("a1"));
}

#[test]
fn missing_snapshot_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("missing.snap")).unwrap().is_none());
}

#[test]
fn corrupt_snapshot_rotates_to_bak() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snap");
    std::fs::write(&path, b"not zstd at all").unwrap();

    assert!(load_snapshot(&path).unwrap().is_none());
    assert!(path.with_extension("bak").exists());
    assert!(!path.exists());
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snap");

    for generation in 0..5 {
        std::fs::write(&path, format!("garbage {generation}")).unwrap();
        assert!(load_snapshot(&path).unwrap().is_none());
    }

    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}
