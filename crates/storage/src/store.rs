// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store facade: transactional commits over WAL + materialized state.

use crate::snapshot::{load_snapshot, Snapshot, SnapshotError};
use crate::state::StoreState;
use crate::wal::{Wal, WalError};
use sloth_core::StoreEvent;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

const WAL_FILE: &str = "store.wal";
const SNAPSHOT_FILE: &str = "store.snap";

/// The embedded store.
///
/// All persisted state lives in one directory: `store.wal` (JSONL event
/// log) and `store.snap` (zstd snapshot). A commit batch is the
/// transaction unit: every event in the batch is durable before any of
/// them applies, and they apply under one state lock.
pub struct Store {
    state: Mutex<StoreState>,
    wal: Mutex<Wal>,
    snapshot_path: PathBuf,
}

impl Store {
    /// Open the store in `dir`, recovering from snapshot + WAL replay.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let wal_path = dir.join(WAL_FILE);

        let (mut state, snapshot_seq) = match load_snapshot(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (StoreState::default(), 0),
        };

        let wal = Wal::open(&wal_path)?;
        let replayed = wal.entries_after(snapshot_seq)?;
        let replay_count = replayed.len();
        for entry in replayed {
            state.apply(&entry.event);
        }
        if replay_count > 0 {
            tracing::info!(replay_count, snapshot_seq, "recovered store from WAL replay");
        }

        Ok(Self { state: Mutex::new(state), wal: Mutex::new(wal), snapshot_path })
    }

    /// Commit a batch of events: append to the WAL, fsync, then apply.
    ///
    /// The batch is atomic with respect to readers and to recovery: a crash
    /// either replays the whole batch or none of it reaches the state.
    pub fn commit(&self, events: Vec<StoreEvent>) -> Result<(), StoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let mut wal = self.wal.lock();
        for event in &events {
            wal.append(event)?;
        }
        wal.flush()?;

        let mut state = self.state.lock();
        for event in &events {
            tracing::debug!(event = event.name(), "applying store event");
            state.apply(event);
        }
        Ok(())
    }

    /// Commit a single event.
    pub fn commit_one(&self, event: StoreEvent) -> Result<(), StoreError> {
        self.commit(vec![event])
    }

    /// Run a closure against the current state under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Write a durable snapshot and truncate the WAL through its sequence.
    ///
    /// Blocking (serialisation, compression, fsync); callers on the async
    /// side wrap this in `spawn_blocking`.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        // Lock order matches commit (wal, then state) to avoid deadlock.
        let (state_clone, seq) = {
            let wal = self.wal.lock();
            let state = self.state.lock();
            (state.clone(), wal.write_seq())
        };

        if seq == 0 {
            return Ok(());
        }

        Snapshot::new(seq, state_clone).save(&self.snapshot_path)?;

        // Only safe now: the snapshot is durable.
        self.wal.lock().truncate_through(seq)?;
        tracing::debug!(seq, "checkpoint complete");
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
