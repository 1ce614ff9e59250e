// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack state manager.
//!
//! All stack writes funnel through here so the lock discipline holds:
//! a run acquires `Lock(stack_id)` before touching the stack, refreshes it
//! on progress, and releases it in the same commit that finishes the run.
//! Stale locks (past expiry) may be stolen with an explicit force.

use crate::error::TaskError;
use sloth_core::{
    detect_drift, Clock, DriftReport, LockRecord, ObservedResource, Resource, RunRecord, RunId,
    StackId, StackState, StackStatus, StateVersion, StoreEvent,
};
use sloth_storage::{Store, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StackError {
    #[error("stack not found: {0}")]
    NotFound(String),

    #[error("stack {stack} is locked by {holder}")]
    Locked { stack: String, holder: String },

    #[error("stack {stack} has no version {version}")]
    VersionNotFound { stack: String, version: u64 },

    #[error("stack name already in use: {0}")]
    NameTaken(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<StackError> for TaskError {
    fn from(err: StackError) -> Self {
        TaskError::State(err.to_string())
    }
}

/// Versioned, lockable access to stacks.
pub struct StackManager<C: Clock> {
    store: Arc<Store>,
    clock: C,
}

impl<C: Clock> StackManager<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Create a stack with a unique name.
    pub fn create(
        &self,
        name: &str,
        metadata: BTreeMap<String, String>,
    ) -> Result<StackState, StackError> {
        let taken = self.store.read(|s| s.stacks.values().any(|st| st.name == name));
        if taken {
            return Err(StackError::NameTaken(name.to_string()));
        }
        let stack = StackState::new(name, metadata, self.clock.epoch_ms());
        self.store.commit_one(StoreEvent::StackCreated { stack: stack.clone() })?;
        Ok(stack)
    }

    /// Get a stack by name, creating it on first use.
    pub fn ensure(&self, name: &str) -> Result<StackState, StackError> {
        if let Some(stack) = self.store.read(|s| s.find_stack(name).cloned()) {
            return Ok(stack);
        }
        self.create(name, BTreeMap::new())
    }

    /// Look up a stack by name or ID prefix.
    pub fn get(&self, key: &str) -> Result<StackState, StackError> {
        self.store
            .read(|s| s.find_stack(key).cloned())
            .ok_or_else(|| StackError::NotFound(key.to_string()))
    }

    pub fn list(&self) -> Vec<StackState> {
        let mut stacks = self.store.read(|s| s.stacks.values().cloned().collect::<Vec<_>>());
        stacks.sort_by(|a, b| a.name.cmp(&b.name));
        stacks
    }

    pub fn versions(&self, key: &str) -> Result<Vec<StateVersion>, StackError> {
        let stack = self.get(key)?;
        Ok(self.store.read(|s| s.stack_versions(stack.id.as_str()).to_vec()))
    }

    /// Begin a run: acquire the stack lock and open a history record.
    ///
    /// Fails with [`StackError::Locked`] when another holder's unexpired
    /// lock is in place; `force` steals a lock past its expiry.
    pub fn begin_run(
        &self,
        stack_id: StackId,
        run: RunRecord,
        holder: &str,
        force: bool,
    ) -> Result<(), StackError> {
        let now_ms = self.clock.epoch_ms();
        self.check_lock(stack_id, holder, force, now_ms)?;

        let lock = LockRecord::new(stack_id.as_str(), holder, now_ms);
        self.store.commit(vec![
            StoreEvent::LockAcquired { lock },
            StoreEvent::StackRunStarted { stack_id, run, holder: holder.to_string(), at_ms: now_ms },
        ])?;
        Ok(())
    }

    /// Extend the run lock; called as tasks complete.
    pub fn refresh_lock(&self, stack_id: StackId, holder: &str) -> Result<(), StackError> {
        let now_ms = self.clock.epoch_ms();
        self.store.commit_one(StoreEvent::LockRefreshed {
            name: stack_id.to_string(),
            holder: holder.to_string(),
            expires_at_ms: now_ms + sloth_core::LOCK_TTL_MS,
        })?;
        Ok(())
    }

    /// Record a resource into the running stack (upsert).
    pub fn record_resource(
        &self,
        stack_id: StackId,
        resource: Resource,
    ) -> Result<(), StackError> {
        self.store.commit_one(StoreEvent::StackResourceRecorded { stack_id, resource })?;
        Ok(())
    }

    /// Record an exported output into the running stack.
    pub fn record_output(
        &self,
        stack_id: StackId,
        key: &str,
        value: &str,
    ) -> Result<(), StackError> {
        self.store.commit_one(StoreEvent::StackOutputRecorded {
            stack_id,
            key: key.to_string(),
            value: value.to_string(),
        })?;
        Ok(())
    }

    /// Finish a run: snapshot a new version, close the history record, and
    /// release the lock, all in one commit.
    pub fn end_run(
        &self,
        stack_id: StackId,
        run_id: RunId,
        holder: &str,
        status: StackStatus,
        error: Option<String>,
    ) -> Result<(), StackError> {
        let now_ms = self.clock.epoch_ms();
        let stack = self
            .store
            .read(|s| s.stack(stack_id.as_str()).cloned())
            .ok_or_else(|| StackError::NotFound(stack_id.to_string()))?;

        let mut snapshot_source = stack.clone();
        snapshot_source.status = status;
        let version = snapshot_source.snapshot(
            stack.version + 1,
            format!("run {run_id}"),
            now_ms,
        );

        self.store.commit(vec![
            StoreEvent::StackRunFinished { stack_id, run_id, status, error, version, at_ms: now_ms },
            StoreEvent::LockReleased { name: stack_id.to_string(), holder: holder.to_string() },
        ])?;
        Ok(())
    }

    /// Roll a stack back to a target version's contents.
    ///
    /// Produces a new version (rollback to the current version is a no-op
    /// for the contents but still versions). Refuses while another
    /// holder's unexpired lock is in place.
    pub fn rollback(&self, key: &str, target_version: u64, force: bool) -> Result<StackState, StackError> {
        let stack = self.get(key)?;
        let now_ms = self.clock.epoch_ms();
        self.check_lock(stack.id, "rollback", force, now_ms)?;

        let target = self
            .store
            .read(|s| s.stack_version(stack.id.as_str(), target_version).cloned())
            .ok_or(StackError::VersionNotFound {
                stack: stack.name.clone(),
                version: target_version,
            })?;

        let restored = StateVersion {
            stack_id: stack.id,
            version: stack.version + 1,
            description: format!("rollback to version {target_version}"),
            status: StackStatus::RolledBack,
            resources: target.resources.clone(),
            outputs: target.outputs.clone(),
            created_at_ms: now_ms,
        };

        self.store.commit_one(StoreEvent::StackRolledBack {
            stack_id: stack.id,
            target_version,
            version: restored,
            at_ms: now_ms,
        })?;

        self.get(stack.id.as_str())
    }

    /// Diff recorded resource attributes against observed reality. Reads
    /// only; the stack is untouched.
    pub fn drift(&self, key: &str, observed: &[ObservedResource]) -> Result<DriftReport, StackError> {
        let stack = self.get(key)?;
        Ok(detect_drift(&stack, observed, self.clock.epoch_ms()))
    }

    /// Delete a stack and everything it owns.
    pub fn delete(&self, key: &str) -> Result<(), StackError> {
        let stack = self.get(key)?;
        self.store.commit(vec![
            StoreEvent::StackDeleted { stack_id: stack.id },
            StoreEvent::LockReleased {
                name: stack.id.to_string(),
                holder: stack.locked_by.unwrap_or_default(),
            },
        ])?;
        Ok(())
    }

    fn check_lock(
        &self,
        stack_id: StackId,
        holder: &str,
        force: bool,
        now_ms: u64,
    ) -> Result<(), StackError> {
        let existing = self.store.read(|s| s.locks.get(stack_id.as_str()).cloned());
        if let Some(lock) = existing {
            if lock.holder != holder && !lock.is_expired(now_ms) {
                return Err(StackError::Locked {
                    stack: stack_id.to_string(),
                    holder: lock.holder,
                });
            }
            if lock.holder != holder && !force {
                // Expired but present: stealing is an explicit decision.
                return Err(StackError::Locked {
                    stack: stack_id.to_string(),
                    holder: lock.holder,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
