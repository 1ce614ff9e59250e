// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack model: persistent workflow state.
//!
//! A stack records one logical deployment: its tracked resources, exported
//! outputs, versioned snapshots, and run history. Versions increase strictly
//! per stack; the stack owns its resources, outputs, and versions (deleting
//! the stack deletes them all).

use crate::{ResourceId, RunId, StackId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStatus {
    Pending,
    Running,
    Success,
    Failed,
    RolledBack,
}

crate::simple_display! {
    StackStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        RolledBack => "rolled_back",
    }
}

/// What a workflow did to a tracked resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    #[default]
    Create,
    Update,
    Delete,
    Read,
    Noop,
}

crate::simple_display! {
    ResourceAction {
        Create => "create",
        Update => "update",
        Delete => "delete",
        Read => "read",
        Noop => "noop",
    }
}

/// A tracked side-effect of a workflow (container, bucket, record, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Resource type, e.g. `docker_container`.
    pub kind: String,
    pub name: String,
    pub action: ResourceAction,
    #[serde(default)]
    pub status: String,
    /// Opaque attribute document; drift detection diffs this against
    /// observed reality.
    #[serde(default)]
    pub attributes: serde_json::Value,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

/// Snapshot row keyed by `(stack_id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateVersion {
    pub stack_id: StackId,
    pub version: u64,
    #[serde(default)]
    pub description: String,
    pub status: StackStatus,
    pub resources: Vec<Resource>,
    pub outputs: BTreeMap<String, String>,
    pub created_at_ms: u64,
}

/// One entry of a stack's execution history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    /// Workflow (task group) name that was executed.
    pub workflow: String,
    /// Content hash of the workflow definition that ran.
    pub definition_hash: String,
    pub status: StackStatus,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A stack instance recording one logical deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackState {
    pub id: StackId,
    /// Unique stack name.
    pub name: String,
    /// Monotonically increasing; bumped by every finished run or rollback.
    pub version: u64,
    pub status: StackStatus,
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// Exported key/value outputs from the last run.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    /// Holder of the run lock, when a run is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    /// Execution history, oldest first.
    #[serde(default)]
    pub history: Vec<RunRecord>,
}

impl StackState {
    /// Fresh stack: version 1, pending, no resources.
    pub fn new(name: impl Into<String>, metadata: BTreeMap<String, String>, now_ms: u64) -> Self {
        Self {
            id: StackId::new(),
            name: name.into(),
            version: 1,
            status: StackStatus::Pending,
            created_at_ms: now_ms,
            started_at_ms: None,
            completed_at_ms: None,
            duration_ms: None,
            error: None,
            metadata,
            resources: Vec::new(),
            outputs: BTreeMap::new(),
            locked_by: None,
            history: Vec::new(),
        }
    }

    /// Find a tracked resource by kind and name.
    pub fn resource(&self, kind: &str, name: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.kind == kind && r.name == name)
    }

    /// Upsert a resource, keyed by `(kind, name)`.
    pub fn record_resource(&mut self, resource: Resource) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.kind == resource.kind && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    /// Capture the current resources/outputs as a version snapshot.
    pub fn snapshot(&self, version: u64, description: impl Into<String>, now_ms: u64) -> StateVersion {
        StateVersion {
            stack_id: self.id,
            version,
            description: description.into(),
            status: self.status,
            resources: self.resources.clone(),
            outputs: self.outputs.clone(),
            created_at_ms: now_ms,
        }
    }
}

crate::builder! {
    pub struct StackStateBuilder => StackState {
        into {
            name: String = "default",
        }
        set {
            id: StackId = StackId::new(),
            version: u64 = 1,
            status: StackStatus = StackStatus::Pending,
            created_at_ms: u64 = 1_000_000,
            metadata: BTreeMap<String, String> = BTreeMap::new(),
            resources: Vec<Resource> = Vec::new(),
            outputs: BTreeMap<String, String> = BTreeMap::new(),
            history: Vec<RunRecord> = Vec::new(),
        }
        option {
            started_at_ms: u64 = None,
            completed_at_ms: u64 = None,
            duration_ms: u64 = None,
            error: String = None,
            locked_by: String = None,
        }
    }
}

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
