// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named locks.
//!
//! Every stack write path goes through `Lock(stack_id)`. Locks are
//! process-local but persisted so external tools can see them; a lock past
//! its expiry may be stolen with an explicit force.

use serde::{Deserialize, Serialize};

/// Default lock lifetime. Refreshed on run progress.
pub const LOCK_TTL_MS: u64 = 600_000;

/// A named lock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub name: String,
    /// Opaque holder identifier (run id plus a random token).
    pub holder: String,
    pub acquired_at_ms: u64,
    pub expires_at_ms: u64,
}

impl LockRecord {
    pub fn new(name: impl Into<String>, holder: impl Into<String>, now_ms: u64) -> Self {
        Self {
            name: name.into(),
            holder: holder.into(),
            acquired_at_ms: now_ms,
            expires_at_ms: now_ms + LOCK_TTL_MS,
        }
    }

    /// A stale lock no longer protects its resource and may be stolen.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Extend the expiry from `now_ms`.
    pub fn refresh(&mut self, now_ms: u64) {
        self.expires_at_ms = now_ms + LOCK_TTL_MS;
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
