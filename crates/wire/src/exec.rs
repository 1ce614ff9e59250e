// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution service contract (master to agent).
//!
//! The client sends one [`ExecRequest`]; the agent answers with a stream of
//! [`ExecFrame`]s. Output frames are delivered in order per stream (stdout
//! and stderr may interleave, each preserves its own order). The final
//! frame is `Exit`, `TaskResult`, `Error`, or `Ok`, after which both sides
//! close. Closing the connection early cancels the work: the agent watches
//! for EOF and kills the subprocess, SIGTERM first, SIGKILL after the grace
//! period.

use crate::payload::ArchiveInfo;
use crate::types::{TaskEnvelope, WorkflowContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Request to an agent's execution service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ExecRequest {
    /// Liveness probe.
    Ping,

    /// Run a one-shot shell command, streaming its output.
    RunCommand {
        command: String,
        #[serde(default)]
        env: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
    },

    /// Execute a serialised task. The workspace archive announced by
    /// `workspace` follows as raw chunks immediately after this frame.
    ExecuteTask {
        task: TaskEnvelope,
        context: WorkflowContext,
        workspace: ArchiveInfo,
    },

    /// Ask the agent to move to a target version. The agent answers with
    /// `UpdateResult`; actually swapping the binary is deployment's job.
    UpdateAgent { target_version: String },

    /// Stop the agent process. In-flight work gets the grace period.
    Shutdown { reason: String },
}

/// Failure category for the final `Error` frame. Application failures
/// (non-zero exit, task returned failure) never use `Error`; they ride in
/// `Exit` / `TaskResult` so the caller keeps the transport/application
/// distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecErrorKind {
    /// The work could not be started at all.
    Execution,
    /// The per-call deadline elapsed; the subprocess was killed.
    Timeout,
    /// The caller went away and the work was cancelled.
    Cancelled,
    /// The request needs a script runtime this agent does not have.
    Unsupported,
    Internal,
}

sloth_core::simple_display! {
    ExecErrorKind {
        Execution => "execution",
        Timeout => "timeout",
        Cancelled => "cancelled",
        Unsupported => "unsupported",
        Internal => "internal",
    }
}

/// One frame of an execution stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ExecFrame {
    /// The subprocess is running.
    Started,

    /// Captured stdout bytes (lossy UTF-8).
    Stdout { data: String },

    /// Captured stderr bytes (lossy UTF-8).
    Stderr { data: String },

    /// Final frame for `RunCommand`: the subprocess exited.
    Exit {
        code: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Final frame for `ExecuteTask`. The artifact archive announced by
    /// `artifacts` follows as raw chunks.
    TaskResult {
        success: bool,
        message: String,
        #[serde(default)]
        outputs: BTreeMap<String, String>,
        artifacts: ArchiveInfo,
    },

    /// Final frame: the work did not produce a result.
    Error { kind: ExecErrorKind, message: String },

    /// Final frame for `UpdateAgent`.
    UpdateResult { ok: bool, restart_required: bool },

    /// Final frame for `Ping` and `Shutdown`.
    Ok,
}

impl ExecFrame {
    /// Frames after which the stream ends.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ExecFrame::Exit { .. }
                | ExecFrame::TaskResult { .. }
                | ExecFrame::Error { .. }
                | ExecFrame::UpdateResult { .. }
                | ExecFrame::Ok
        )
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
