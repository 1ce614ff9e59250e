// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded store for Sloth Runner.
//!
//! State is event-sourced: every write is a [`sloth_core::StoreEvent`]
//! appended to a JSONL write-ahead log and applied to the in-memory
//! [`StoreState`] tables. Recovery loads the latest zstd snapshot and
//! replays WAL entries after its sequence number. A commit batch applies
//! under one lock, so a multi-table update is atomic.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod snapshot;
mod state;
mod store;
mod wal;

pub use snapshot::{load_snapshot, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::StoreState;
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};
