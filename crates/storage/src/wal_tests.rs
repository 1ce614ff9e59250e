// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;

fn heartbeat(name: &str, at_ms: u64) -> StoreEvent {
    StoreEvent::AgentHeartbeat { name: name.to_string(), at_ms }
}

#[test]
fn append_assigns_increasing_sequences() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("store.wal")).unwrap();

    assert_eq!(wal.append(&heartbeat("a", 1)).unwrap(), 1);
    assert_eq!(wal.append(&heartbeat("a", 2)).unwrap(), 2);
    assert_eq!(wal.write_seq(), 2);
}

#[test]
fn entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&heartbeat("a", 1)).unwrap();
        wal.append(&heartbeat("b", 2)).unwrap();
        wal.flush().unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 2);
    let entries = wal.entries_after(0).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].seq, 2);
    assert_eq!(entries[1].event, heartbeat("b", 2));
}

#[test]
fn entries_after_skips_processed() {
    let dir = tempfile::tempdir().unwrap();
    let mut wal = Wal::open(&dir.path().join("store.wal")).unwrap();
    for i in 1..=5 {
        wal.append(&heartbeat("a", i)).unwrap();
    }
    wal.flush().unwrap();

    let entries = wal.entries_after(3).unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![4, 5]);
}

#[test]
fn unflushed_appends_are_not_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&heartbeat("a", 1)).unwrap();
        // dropped without flush
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 0);
}

#[test]
fn corrupt_tail_is_rotated_keeping_valid_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.wal");

    {
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&heartbeat("a", 1)).unwrap();
        wal.flush().unwrap();
    }
    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"seq\":2,\"event\":{\"type\":\"agent:heart").unwrap();
    }

    let wal = Wal::open(&path).unwrap();
    assert_eq!(wal.write_seq(), 1);
    assert_eq!(wal.entries_after(0).unwrap().len(), 1);
    assert!(path.with_extension("bak").exists());
}

#[test]
fn truncate_through_drops_old_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.wal");
    let mut wal = Wal::open(&path).unwrap();
    for i in 1..=4 {
        wal.append(&heartbeat("a", i)).unwrap();
    }
    wal.truncate_through(3).unwrap();

    let entries = wal.entries_after(0).unwrap();
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![4]);

    // New appends continue the sequence.
    assert_eq!(wal.append(&heartbeat("a", 9)).unwrap(), 5);
}
