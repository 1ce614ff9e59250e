// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry record.
//!
//! An agent is a remote worker process. The registry keeps one record per
//! agent name; status transitions are driven by heartbeats and the
//! reachability sweep. Records are deleted only by explicit admin action.

use serde::{Deserialize, Serialize};

/// Heartbeats older than this flip an agent to `Inactive`.
pub const HEARTBEAT_STALE_MS: u64 = 90_000;

/// Reachability status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Active,
    Inactive,
    Unknown,
}

crate::simple_display! {
    AgentStatus {
        Active => "active",
        Inactive => "inactive",
        Unknown => "unknown",
    }
}

/// Record of a remote worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// Unique registry key.
    pub name: String,
    /// host:port of the agent's execution listener.
    pub address: String,
    pub status: AgentStatus,
    pub last_heartbeat_ms: u64,
    pub last_info_collected_ms: u64,
    pub registered_at_ms: u64,
    /// Agent binary version reported at registration.
    pub version: String,
    /// Opaque host facts (hostname, os, arch, cpus) reported by the agent.
    #[serde(default)]
    pub system_info: serde_json::Value,
    /// Why the agent was marked inactive, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inactive_reason: Option<String>,
}

impl AgentRecord {
    /// Fresh record for a registering agent.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        version: impl Into<String>,
        system_info: serde_json::Value,
        now_ms: u64,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            status: AgentStatus::Active,
            last_heartbeat_ms: now_ms,
            last_info_collected_ms: now_ms,
            registered_at_ms: now_ms,
            version: version.into(),
            system_info,
            inactive_reason: None,
        }
    }

    /// True when the last heartbeat is older than the staleness threshold.
    pub fn is_stale(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_heartbeat_ms) > HEARTBEAT_STALE_MS
    }

    /// An inactive agent may not receive new delegations but stays queryable.
    pub fn accepts_work(&self) -> bool {
        self.status == AgentStatus::Active
    }
}

crate::builder! {
    pub struct AgentRecordBuilder => AgentRecord {
        into {
            name: String = "agent-1",
            address: String = "127.0.0.1:50060",
            version: String = "0.1.0",
        }
        set {
            status: AgentStatus = AgentStatus::Active,
            last_heartbeat_ms: u64 = 1_000_000,
            last_info_collected_ms: u64 = 1_000_000,
            registered_at_ms: u64 = 1_000_000,
            system_info: serde_json::Value = serde_json::Value::Null,
        }
        option {
            inactive_reason: String = None,
        }
    }
}

#[cfg(test)]
#[path = "agent_record_tests.rs"]
mod tests;
