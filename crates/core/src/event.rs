// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store events: the facts the persistence layer records.
//!
//! State is derived from events. Every write to the store is one
//! [`StoreEvent`]; a multi-table mutation (a finished run touches the stack,
//! its resources, its outputs, and the version table) is a single event so
//! it applies atomically and replays identically after a crash.
//!
//! Serializes with `{"type": "table:verb", ...fields}`.

use crate::agent_record::AgentRecord;
use crate::hook::{HookDef, HookEvent, HookEventStatus};
use crate::lock::LockRecord;
use crate::stack::{Resource, RunRecord, StackState, StackStatus, StateVersion};
use crate::{EventId, RunId, StackId};
use serde::{Deserialize, Serialize};

/// Events that mutate persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    // -- agents --
    /// Upsert on registration; sets the record active with a fresh heartbeat.
    #[serde(rename = "agent:registered")]
    AgentRegistered { record: AgentRecord },

    #[serde(rename = "agent:heartbeat")]
    AgentHeartbeat { name: String, at_ms: u64 },

    /// Idempotent: marking an already-inactive agent changes nothing.
    #[serde(rename = "agent:marked-inactive")]
    AgentMarkedInactive { name: String, reason: String, at_ms: u64 },

    #[serde(rename = "agent:removed")]
    AgentRemoved { name: String },

    // -- stacks --
    #[serde(rename = "stack:created")]
    StackCreated { stack: StackState },

    /// A run begins: stack goes running, history gains an open record.
    /// The accompanying lock acquisition is a separate event in the same
    /// commit batch.
    #[serde(rename = "stack:run-started")]
    StackRunStarted { stack_id: StackId, run: RunRecord, holder: String, at_ms: u64 },

    #[serde(rename = "stack:resource-recorded")]
    StackResourceRecorded { stack_id: StackId, resource: Resource },

    #[serde(rename = "stack:output-recorded")]
    StackOutputRecorded { stack_id: StackId, key: String, value: String },

    /// A run ends: stack status/timings update, the version table gains the
    /// snapshot, the open history record closes, `locked_by` clears.
    #[serde(rename = "stack:run-finished")]
    StackRunFinished {
        stack_id: StackId,
        run_id: RunId,
        status: StackStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        version: StateVersion,
        at_ms: u64,
    },

    /// Version table contents of `target_version` become the live state,
    /// recorded as a fresh version with status rolled_back.
    #[serde(rename = "stack:rolled-back")]
    StackRolledBack { stack_id: StackId, target_version: u64, version: StateVersion, at_ms: u64 },

    /// Cascade delete: versions and history go with the stack.
    #[serde(rename = "stack:deleted")]
    StackDeleted { stack_id: StackId },

    // -- locks --
    #[serde(rename = "lock:acquired")]
    LockAcquired { lock: LockRecord },

    #[serde(rename = "lock:refreshed")]
    LockRefreshed { name: String, holder: String, expires_at_ms: u64 },

    /// Releases only when the holder matches; a stale steal already
    /// replaced the row.
    #[serde(rename = "lock:released")]
    LockReleased { name: String, holder: String },

    // -- hooks --
    #[serde(rename = "hook:registered")]
    HookRegistered { def: HookDef },

    #[serde(rename = "hook:removed")]
    HookRemoved { name: String },

    #[serde(rename = "event:enqueued")]
    HookEventEnqueued { event: HookEvent },

    #[serde(rename = "event:status-changed")]
    HookEventStatusChanged {
        id: EventId,
        status: HookEventStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        at_ms: u64,
    },
}

impl StoreEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::AgentRegistered { .. } => "agent:registered",
            StoreEvent::AgentHeartbeat { .. } => "agent:heartbeat",
            StoreEvent::AgentMarkedInactive { .. } => "agent:marked-inactive",
            StoreEvent::AgentRemoved { .. } => "agent:removed",
            StoreEvent::StackCreated { .. } => "stack:created",
            StoreEvent::StackRunStarted { .. } => "stack:run-started",
            StoreEvent::StackResourceRecorded { .. } => "stack:resource-recorded",
            StoreEvent::StackOutputRecorded { .. } => "stack:output-recorded",
            StoreEvent::StackRunFinished { .. } => "stack:run-finished",
            StoreEvent::StackRolledBack { .. } => "stack:rolled-back",
            StoreEvent::StackDeleted { .. } => "stack:deleted",
            StoreEvent::LockAcquired { .. } => "lock:acquired",
            StoreEvent::LockRefreshed { .. } => "lock:refreshed",
            StoreEvent::LockReleased { .. } => "lock:released",
            StoreEvent::HookRegistered { .. } => "hook:registered",
            StoreEvent::HookRemoved { .. } => "hook:removed",
            StoreEvent::HookEventEnqueued { .. } => "event:enqueued",
            StoreEvent::HookEventStatusChanged { .. } => "event:status-changed",
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
