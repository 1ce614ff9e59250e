// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO structs shared across the wire protocol.

use sloth_core::{StackStatus, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Agent registry entry for listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentInfo {
    pub name: String,
    pub address: String,
    pub status: String,
    pub last_heartbeat_ms: u64,
    pub last_info_collected_ms: u64,
    pub version: String,
    #[serde(default)]
    pub system_info: serde_json::Value,
}

/// A serialised task shipped to an agent, with the dependency outputs it
/// may consume. `delegate_to` is cleared before shipping so delegation
/// never recurses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEnvelope {
    pub task: Task,
    #[serde(default)]
    pub dep_outputs: BTreeMap<String, String>,
}

/// Run context shipped alongside a delegated task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowContext {
    pub run_id: String,
    pub workflow: String,
    pub stack: String,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Stack identity carried in run reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackRef {
    pub id: String,
    pub name: String,
}

/// Per-task entry of a run report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskReport {
    pub status: TaskStatus,
    pub duration_ms: u64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Agent(s) the task ran on, empty for local execution.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
}

/// Result of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub workflow: String,
    pub stack: StackRef,
    /// Final stack status for the run: success, failed, or rolled over
    /// from an abort.
    pub status: StackStatus,
    pub started_at_ms: u64,
    pub duration_ms: u64,
    /// Tasks in definition order.
    pub tasks: Vec<(String, TaskReport)>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.status == StackStatus::Success
    }

    /// Look up a task's report by name.
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }
}

/// Stack list entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackSummary {
    pub id: String,
    pub name: String,
    pub version: u64,
    pub status: StackStatus,
    pub resources: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

/// Full stack state for `show`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackDetail {
    pub stack: sloth_core::StackState,
}

/// Version history entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSummary {
    pub version: u64,
    pub status: StackStatus,
    pub description: String,
    pub resources: usize,
    pub created_at_ms: u64,
}

/// Master daemon status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterStatus {
    pub version: String,
    pub uptime_ms: u64,
    pub agents_active: usize,
    pub agents_inactive: usize,
    pub stacks: usize,
    pub pending_events: usize,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
