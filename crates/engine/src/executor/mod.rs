// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor strategies.
//!
//! One entry point, [`execute_task`], selects the strategy from the task's
//! delegation target: in-process for local tasks, a single agent stream
//! for delegated tasks, fan-out across agents for multi-host tasks.

mod delegated;
mod local;
mod multi_host;

use crate::channel::{AgentChannel, AgentResolver};
use crate::error::TaskError;
use crate::logger::TaskLogger;
use sloth_core::{DelegateTarget, ScriptRuntime, Task};
use sloth_wire::WorkflowContext;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything one task execution needs, cloneable so fan-out can hand each
/// host its own copy.
#[derive(Clone)]
pub struct ExecutionContext {
    /// The task's prepared working directory (consumes already staged).
    pub workdir: PathBuf,
    /// Environment for the task's subprocesses.
    pub env: BTreeMap<String, String>,
    /// Run parameters, for script invocation.
    pub params: BTreeMap<String, String>,
    /// Outputs of the task's dependencies.
    pub dep_outputs: BTreeMap<String, String>,
    /// Run identity shipped with delegated tasks.
    pub run: WorkflowContext,
    pub logger: TaskLogger,
    pub cancel: CancellationToken,
    /// Per-attempt deadline.
    pub timeout: Option<Duration>,
    pub script: Arc<dyn ScriptRuntime>,
    pub resolver: Arc<dyn AgentResolver>,
    pub channel: Arc<dyn AgentChannel>,
}

/// A successful task execution.
#[derive(Debug, Clone, Default)]
pub struct TaskOutcome {
    pub message: String,
    pub outputs: BTreeMap<String, String>,
    /// Agents the task ran on; empty for local execution.
    pub agents: Vec<String>,
}

/// Execute one attempt of a task with the strategy its delegation target
/// selects. Failure (including the task reporting `success = false`)
/// comes back as an error so the retry loop treats every strategy alike.
pub async fn execute_task(
    task: &Task,
    ctx: &ExecutionContext,
) -> Result<TaskOutcome, TaskError> {
    match &task.delegate_to {
        DelegateTarget::Local => local::execute(task, ctx).await,
        DelegateTarget::Agent(agent) => delegated::execute(agent, task, ctx).await,
        DelegateTarget::Agents(agents) => multi_host::execute(agents, task, ctx).await,
    }
}

#[cfg(test)]
#[path = "../executor_tests.rs"]
mod tests;
