// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry service requests (agent/CLI to master).

use sloth_core::ObservedResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Request to the master. One request per connection; the response closes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake. Required as the first request on TCP connections;
    /// carries the auth token when the master demands one.
    Hello {
        version: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Agent registration (upsert). Sets the record active with a fresh
    /// heartbeat; idempotent for the same (name, address).
    AgentRegister {
        name: String,
        /// host:port where the agent's execution service listens.
        address: String,
        version: String,
        #[serde(default)]
        system_info: serde_json::Value,
    },

    /// Agent liveness. An unknown name gets `unknown_agent` back so the
    /// agent can re-register.
    AgentHeartbeat { name: String },

    /// Enumerate agents, optionally only one status.
    AgentList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },

    /// Resolve an agent name to its execution address. Fails fast when the
    /// agent is inactive.
    AgentResolve { name: String },

    /// Mark an agent inactive (idempotent).
    AgentMarkInactive { name: String, reason: String },

    /// Delete an agent record.
    AgentRemove { name: String },

    /// Ask the master to send a shutdown RPC to an agent.
    AgentStop { name: String },

    /// Ask the master to relay an update RPC to an agent.
    AgentUpdate { name: String, target_version: String },

    /// Execute a workflow definition against a stack.
    RunWorkflow {
        /// Stack name; created on first use.
        stack: String,
        /// Workflow definition file content.
        source: String,
        /// Definition format by file extension: "hcl", "toml", or "json".
        format: String,
        /// Workflow name within the file, when it defines more than one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow: Option<String>,
        #[serde(default)]
        params: BTreeMap<String, String>,
        /// Directory the workflow was invoked from; `workdir = "inherit"`
        /// tasks run here.
        base_dir: std::path::PathBuf,
        /// Steal an expired stack lock.
        #[serde(default)]
        force: bool,
    },

    /// List stacks.
    StackList,

    /// Show one stack by name or ID prefix.
    StackShow { stack: String },

    /// Delete a stack and everything it owns.
    StackDelete { stack: String },

    /// List the version history of a stack.
    StateVersions { stack: String },

    /// Roll a stack back to a target version.
    StateRollback {
        stack: String,
        version: u64,
        /// Steal an expired lock.
        #[serde(default)]
        force: bool,
    },

    /// Diff recorded resource attributes against observed ones.
    StateDrift { stack: String, observed: Vec<ObservedResource> },

    /// Get daemon status
    Status,

    /// Request master shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
