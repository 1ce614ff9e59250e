// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and task group model.
//!
//! A [`Task`] is a unit of work inside a [`TaskGroup`]. The group owns its
//! tasks; tasks reference agents only by name, resolution is deferred to
//! dispatch time.

use crate::retry::RetryPolicy;
use crate::script::ScriptHandle;
use crate::{GroupId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// How a task does its work: a shell command line, or a handle into the
/// embedded script runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Shell(String),
    Script(ScriptHandle),
}

impl Command {
    pub fn is_script(&self) -> bool {
        matches!(self, Command::Script(_))
    }
}

/// A conditional gate: a shell command (exit 0 = true) or a script callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Shell(String),
    Script(ScriptHandle),
}

/// Delegation target for a task.
///
/// Serialized as `null` (local), a string (single agent), or a list of
/// strings (fan-out).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateTarget {
    #[default]
    Local,
    Agent(String),
    Agents(Vec<String>),
}

impl DelegateTarget {
    pub fn is_local(&self) -> bool {
        matches!(self, DelegateTarget::Local)
    }

    /// Clear delegation. A task arriving at an agent must run locally there;
    /// chained delegation would recurse.
    pub fn clear(&mut self) {
        *self = DelegateTarget::Local;
    }
}

/// Fan-out scheduling mode for multi-host delegation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    #[default]
    Parallel,
    Sequential,
}

/// Group-success policy for multi-host delegation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutPolicy {
    #[default]
    All,
    Any,
    Majority,
}

crate::simple_display! {
    FanoutMode {
        Parallel => "parallel",
        Sequential => "sequential",
    }
}

crate::simple_display! {
    FanoutPolicy {
        All => "all",
        Any => "any",
        Majority => "majority",
    }
}

/// Working-directory lifecycle for a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkdirPolicy {
    /// Run in the workflow's working directory.
    #[default]
    Inherit,
    /// Run in a private directory created for this task and removed after it.
    Fresh,
    /// Run in the given directory, created if missing.
    Named(PathBuf),
}

/// Lifecycle callbacks attached to a single task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_exec: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_exec: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<Predicate>,
}

impl TaskHooks {
    pub fn is_empty(&self) -> bool {
        self.pre_exec.is_none()
            && self.post_exec.is_none()
            && self.on_success.is_none()
            && self.on_failure.is_none()
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Unique within the owning group.
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub command: Command,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub retry_policy: RetryPolicy,
    /// Base delay between retry attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Per-attempt execution deadline. `None` means no task-level deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_if: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_if: Option<Predicate>,
    /// Tasks that run only when this task fails.
    #[serde(default)]
    pub next_if_fail: Vec<String>,
    #[serde(default)]
    pub delegate_to: DelegateTarget,
    #[serde(default)]
    pub fanout_mode: FanoutMode,
    #[serde(default)]
    pub fanout_policy: FanoutPolicy,
    /// Paths (glob patterns allowed) this task produces.
    #[serde(default)]
    pub artifacts: Vec<String>,
    /// Paths this task expects staged from its dependencies' artifacts.
    #[serde(default)]
    pub consumes: Vec<String>,
    #[serde(default)]
    pub workdir: WorkdirPolicy,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "TaskHooks::is_empty")]
    pub hooks: TaskHooks,
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

impl Task {
    /// Create a task with the given name and shell command, everything else
    /// defaulted.
    pub fn shell(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            command: Command::Shell(command.into()),
            depends_on: Vec::new(),
            retries: 0,
            retry_policy: RetryPolicy::Fixed,
            retry_delay_ms: default_retry_delay_ms(),
            timeout_ms: None,
            run_if: None,
            abort_if: None,
            next_if_fail: Vec::new(),
            delegate_to: DelegateTarget::Local,
            fanout_mode: FanoutMode::Parallel,
            fanout_policy: FanoutPolicy::All,
            artifacts: Vec::new(),
            consumes: Vec::new(),
            workdir: WorkdirPolicy::Inherit,
            params: BTreeMap::new(),
            env: BTreeMap::new(),
            hooks: TaskHooks::default(),
        }
    }
}

/// Runtime status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl TaskStatus {
    /// A task transitions to a terminal status exactly once per run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed | TaskStatus::Skipped)
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Workflow-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Wall-clock deadline for the whole run, including retry sleeps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_max_parallel")]
    pub max_parallel_tasks: usize,
    /// Fail fast after this many consecutive task failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<u32>,
}

fn default_max_parallel() -> usize {
    4
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self { timeout_ms: None, max_parallel_tasks: default_max_parallel(), circuit_breaker: None }
    }
}

/// Lifecycle callbacks attached to a workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHooks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_start: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_complete: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_abort: Option<Predicate>,
}

/// A named collection of tasks with a dependency graph and shared config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    /// Definition order. Ready tasks are scheduled in this order so runs
    /// are reproducible.
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub config: GroupConfig,
    #[serde(default)]
    pub hooks: GroupHooks,
}

impl TaskGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(),
            name: name.into(),
            description: String::new(),
            version: String::new(),
            tasks: Vec::new(),
            config: GroupConfig::default(),
            hooks: GroupHooks::default(),
        }
    }

    /// Look up a task by name.
    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
