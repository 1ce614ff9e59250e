// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized table state, derived from store events.

mod agents;
mod helpers;
mod hooks;
mod locks;
mod stacks;

use sloth_core::{
    AgentRecord, HookDef, HookEvent, HookEventStatus, LockRecord, StackState, StateVersion,
    StoreEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Materialized state built from store-event replay.
///
/// One field per table of the persistence contract: agents, stacks
/// (workflow states with their resources, outputs, and history), version
/// snapshots, named locks, registered hooks, and the hook event queue.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    /// Agent registry, keyed by agent name.
    pub agents: HashMap<String, AgentRecord>,
    /// Stacks, keyed by stack ID.
    pub stacks: HashMap<String, StackState>,
    /// Version snapshots per stack ID, ascending by version.
    #[serde(default)]
    pub versions: HashMap<String, Vec<StateVersion>>,
    /// Named locks, keyed by lock name (stack ID for run locks).
    #[serde(default)]
    pub locks: HashMap<String, LockRecord>,
    /// Registered hooks, keyed by hook name.
    #[serde(default)]
    pub hooks: HashMap<String, HookDef>,
    /// Hook event queue, keyed by event ID.
    #[serde(default)]
    pub events: HashMap<String, HookEvent>,
}

impl StoreState {
    /// Get a stack by exact ID.
    pub fn stack(&self, id: &str) -> Option<&StackState> {
        self.stacks.get(id)
    }

    /// Get a stack by name, exact ID, or unique ID prefix (like git hashes).
    pub fn find_stack(&self, key: &str) -> Option<&StackState> {
        if let Some(stack) = self.stacks.values().find(|s| s.name == key) {
            return Some(stack);
        }
        helpers::find_by_prefix(&self.stacks, key)
    }

    /// Version snapshots for a stack, ascending.
    pub fn stack_versions(&self, stack_id: &str) -> &[StateVersion] {
        self.versions.get(stack_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// One version snapshot of a stack.
    pub fn stack_version(&self, stack_id: &str, version: u64) -> Option<&StateVersion> {
        self.stack_versions(stack_id).iter().find(|v| v.version == version)
    }

    /// Hook events still waiting for dispatch, oldest first.
    pub fn pending_hook_events(&self) -> Vec<&HookEvent> {
        let mut pending: Vec<&HookEvent> =
            self.events.values().filter(|e| e.status == HookEventStatus::Pending).collect();
        pending.sort_by(|a, b| {
            (a.created_at_ms, a.id.as_str()).cmp(&(b.created_at_ms, b.id.as_str()))
        });
        pending
    }

    /// Apply an event to derive state changes.
    ///
    /// # Idempotency Requirement
    ///
    /// **All event handlers MUST be idempotent.** Applying the same event
    /// twice must produce the same state as applying it once: events may
    /// replay after a crash that landed between WAL flush and snapshot.
    ///
    /// Guidelines:
    /// - Use assignment (`=`) instead of mutation (`+=`)
    /// - Guard inserts with existence checks
    /// - Guard transitions with status checks
    pub fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::AgentRegistered { .. }
            | StoreEvent::AgentHeartbeat { .. }
            | StoreEvent::AgentMarkedInactive { .. }
            | StoreEvent::AgentRemoved { .. } => agents::apply(self, event),

            StoreEvent::StackCreated { .. }
            | StoreEvent::StackRunStarted { .. }
            | StoreEvent::StackResourceRecorded { .. }
            | StoreEvent::StackOutputRecorded { .. }
            | StoreEvent::StackRunFinished { .. }
            | StoreEvent::StackRolledBack { .. }
            | StoreEvent::StackDeleted { .. } => stacks::apply(self, event),

            StoreEvent::LockAcquired { .. }
            | StoreEvent::LockRefreshed { .. }
            | StoreEvent::LockReleased { .. } => locks::apply(self, event),

            StoreEvent::HookRegistered { .. }
            | StoreEvent::HookRemoved { .. }
            | StoreEvent::HookEventEnqueued { .. }
            | StoreEvent::HookEventStatusChanged { .. } => hooks::apply(self, event),
        }
    }
}

#[cfg(test)]
#[path = "../state_tests.rs"]
mod tests;
