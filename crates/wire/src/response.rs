// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry service responses (master to agent/CLI).

use crate::types::{AgentInfo, MasterStatus, RunReport, StackDetail, StackSummary, VersionSummary};
use sloth_core::DriftReport;
use serde::{Deserialize, Serialize};

/// Machine-readable failure category, so callers can branch without
/// parsing messages. `unknown_agent` tells a heartbeating agent to
/// re-register; `inactive` distinguishes resolution failures from missing
/// records; `locked` is the stack lock contention case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestErrorKind {
    UnknownAgent,
    NotFound,
    Inactive,
    Locked,
    Invalid,
    Unauthorized,
    Internal,
}

sloth_core::simple_display! {
    RequestErrorKind {
        UnknownAgent => "unknown_agent",
        NotFound => "not_found",
        Inactive => "inactive",
        Locked => "locked",
        Invalid => "invalid",
        Unauthorized => "unauthorized",
        Internal => "internal",
    }
}

/// Response from the master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    Ok,

    Error { kind: RequestErrorKind, message: String },

    /// Registration accepted; echoes the registry key.
    AgentRegistered { name: String },

    Agents { agents: Vec<AgentInfo> },

    AgentAddress { name: String, address: String },

    /// Relayed update outcome from an agent.
    AgentUpdated { name: String, restart_required: bool },

    /// Result of a workflow run, success or not. Transport-level problems
    /// surface as `Error` instead.
    Run { report: RunReport },

    Stacks { stacks: Vec<StackSummary> },

    Stack { stack: StackDetail },

    Versions { versions: Vec<VersionSummary> },

    Drift { report: DriftReport },

    Status { status: MasterStatus },

    ShuttingDown,
}

impl Response {
    /// Convenience constructor for error responses.
    pub fn error(kind: RequestErrorKind, message: impl Into<String>) -> Self {
        Response::Error { kind, message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
