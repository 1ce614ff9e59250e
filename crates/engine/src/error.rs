// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task failure taxonomy.
//!
//! One kind per failure class so retry policy and surfacing decisions are
//! made on the kind, never on message text. Transport, execution, and
//! timeout failures are retryable when the task carries retries;
//! validation, state, and internal failures abort the workflow.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// Workflow graph or definition malformed. Surfaced before execution.
    #[error("validation error: {0}")]
    Validation(String),

    /// Agent name not found or inactive.
    #[error("agent resolution failed: {0}")]
    Resolution(String),

    /// RPC disconnect, deadline, or dial failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Task returned failure or its subprocess exited non-zero.
    #[error("execution failed: {0}")]
    Execution(String),

    /// The task exceeded its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled (workflow abort, shutdown, client gone).
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Lock contention, version mismatch, corrupt snapshot.
    #[error("state error: {0}")]
    State(String),

    /// Invariant violation. Aborts the workflow.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Whether a task-level retry may recover this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::Resolution(_)
                | TaskError::Transport(_)
                | TaskError::Execution(_)
                | TaskError::Timeout(_)
        )
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
