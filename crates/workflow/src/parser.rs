// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow file parsing (HCL, TOML, and JSON).

use crate::duration::{parse_duration, DurationError};
use crate::template::{interpolate, TemplateError};
use crate::validate::{validate_group, ValidationError};
use indexmap::IndexMap;
use sloth_core::{
    Command, DelegateTarget, FanoutMode, FanoutPolicy, GroupConfig, GroupHooks, Predicate,
    RetryPolicy, ScriptHandle, Task, TaskGroup, TaskHooks, TaskId, WorkdirPolicy,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use thiserror::Error;

/// Workflow file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Hcl,
    Toml,
    Json,
}

impl Format {
    /// Pick a format from a file extension; defaults to HCL for `.hcl`
    /// and unknown extensions are `None`.
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext {
            "hcl" => Some(Format::Hcl),
            "toml" => Some(Format::Toml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Format name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Hcl => "hcl",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    pub fn from_name(name: &str) -> Option<Format> {
        Self::from_extension(name)
    }
}

/// Errors that can occur during workflow parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("HCL parse error: {0}")]
    Hcl(#[from] hcl::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid duration in {location}: {source}")]
    Duration { location: String, source: DurationError },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid value for {location}: {message}")]
    InvalidFormat { location: String, message: String },

    #[error("file defines no workflow")]
    NoWorkflow,

    #[error("workflow {0:?} not found in file")]
    UnknownWorkflow(String),

    #[error("file defines multiple workflows ({names}); pick one with --workflow")]
    AmbiguousWorkflow { names: String },
}

/// `delegate_to` accepts a single agent name or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DelegateToDef {
    One(String),
    Many(Vec<String>),
}

/// A task block, as written in the definition file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDef {
    #[serde(default)]
    pub description: String,
    /// Shell command line. Exactly one of `command` / `script` is required.
    #[serde(default)]
    pub command: Option<String>,
    /// Handle of a callable registered in the script runtime.
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub retry_policy: Option<String>,
    #[serde(default)]
    pub retry_delay: Option<String>,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub run_if: Option<String>,
    #[serde(default)]
    pub abort_if: Option<String>,
    #[serde(default)]
    pub next_if_fail: Vec<String>,
    #[serde(default)]
    pub delegate_to: Option<DelegateToDef>,
    /// Fan-out scheduling: `parallel` (default) or `sequential`.
    #[serde(default)]
    pub mode: Option<String>,
    /// Fan-out success policy: `all` (default), `any`, or `majority`.
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default)]
    pub consumes: Vec<String>,
    /// `inherit`, `fresh`, or a directory path.
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub on_success: Option<String>,
    #[serde(default)]
    pub on_failure: Option<String>,
    #[serde(default)]
    pub pre_exec: Option<String>,
    #[serde(default)]
    pub post_exec: Option<String>,
}

/// A workflow block, as written in the definition file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDef {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub max_parallel_tasks: Option<usize>,
    #[serde(default)]
    pub circuit_breaker: Option<u32>,
    #[serde(default)]
    pub on_start: Option<String>,
    #[serde(default)]
    pub on_complete: Option<String>,
    #[serde(default)]
    pub on_abort: Option<String>,
    /// Tasks in definition order; the scheduler preserves it.
    #[serde(default, alias = "task")]
    pub tasks: IndexMap<String, TaskDef>,
}

/// A parsed workflow file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowFile {
    #[serde(default, alias = "workflow")]
    pub workflows: IndexMap<String, WorkflowDef>,
}

impl WorkflowFile {
    /// Pick a workflow: by name when given, otherwise the file must define
    /// exactly one.
    pub fn select(&self, name: Option<&str>) -> Result<(&str, &WorkflowDef), ParseError> {
        match name {
            Some(wanted) => self
                .workflows
                .get_key_value(wanted)
                .map(|(k, v)| (k.as_str(), v))
                .ok_or_else(|| ParseError::UnknownWorkflow(wanted.to_string())),
            None => {
                let mut iter = self.workflows.iter();
                let first = iter.next().ok_or(ParseError::NoWorkflow)?;
                if iter.next().is_some() {
                    let names: Vec<&str> =
                        self.workflows.keys().map(String::as_str).collect();
                    return Err(ParseError::AmbiguousWorkflow { names: names.join(", ") });
                }
                Ok((first.0.as_str(), first.1))
            }
        }
    }
}

/// Parse a workflow file in HCL (convenience wrapper).
pub fn parse_workflow(content: &str) -> Result<WorkflowFile, ParseError> {
    parse_workflow_with_format(content, Format::Hcl)
}

/// Parse a workflow file in the given format.
pub fn parse_workflow_with_format(
    content: &str,
    format: Format,
) -> Result<WorkflowFile, ParseError> {
    let file: WorkflowFile = match format {
        Format::Hcl => hcl::from_str(content)?,
        Format::Toml => toml::from_str(content)?,
        Format::Json => serde_json::from_str(content)?,
    };
    Ok(file)
}

/// Content hash of a definition, recorded in run history.
pub fn definition_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}

/// A callback value: `script:<handle>` references the script runtime,
/// anything else is a shell command.
fn parse_callback(value: &str) -> Predicate {
    match value.strip_prefix("script:") {
        Some(handle) => Predicate::Script(ScriptHandle::new(handle)),
        None => Predicate::Shell(value.to_string()),
    }
}

fn parse_optional_callback(
    value: &Option<String>,
    params: &BTreeMap<String, String>,
    location: &str,
) -> Result<Option<Predicate>, ParseError> {
    match value {
        None => Ok(None),
        Some(raw) => match parse_callback(raw) {
            Predicate::Shell(cmd) => {
                Ok(Some(Predicate::Shell(interpolate(&cmd, params, location)?)))
            }
            script => Ok(Some(script)),
        },
    }
}

fn parse_timeout(
    value: &Option<String>,
    location: &str,
) -> Result<Option<u64>, ParseError> {
    value
        .as_deref()
        .map(|raw| {
            parse_duration(raw)
                .map(|d| d.as_millis() as u64)
                .map_err(|source| ParseError::Duration { location: location.to_string(), source })
        })
        .transpose()
}

impl WorkflowDef {
    /// Materialise this definition into a task group, interpolating the
    /// given run parameters. Validates the graph before returning.
    pub fn to_group(
        &self,
        name: &str,
        run_params: &BTreeMap<String, String>,
    ) -> Result<TaskGroup, ParseError> {
        let mut group = TaskGroup::new(name);
        group.description = self.description.clone();
        group.version = self.version.clone();
        group.config = GroupConfig {
            timeout_ms: parse_timeout(&self.timeout, &format!("workflow {name:?} timeout"))?,
            max_parallel_tasks: self.max_parallel_tasks.unwrap_or(4),
            circuit_breaker: self.circuit_breaker,
        };
        group.hooks = GroupHooks {
            on_start: parse_optional_callback(
                &self.on_start,
                run_params,
                &format!("workflow {name:?} on_start"),
            )?,
            on_complete: parse_optional_callback(
                &self.on_complete,
                run_params,
                &format!("workflow {name:?} on_complete"),
            )?,
            on_abort: parse_optional_callback(
                &self.on_abort,
                run_params,
                &format!("workflow {name:?} on_abort"),
            )?,
        };

        for (task_name, def) in &self.tasks {
            group.tasks.push(def.to_task(task_name, run_params)?);
        }

        validate_group(&group)?;
        Ok(group)
    }
}

impl TaskDef {
    fn to_task(
        &self,
        name: &str,
        run_params: &BTreeMap<String, String>,
    ) -> Result<Task, ParseError> {
        let location = |field: &str| format!("task {name:?} {field}");

        // Run parameters override definition defaults.
        let mut params = self.params.clone();
        for (k, v) in run_params {
            params.insert(k.clone(), v.clone());
        }

        let command = match (&self.command, &self.script) {
            (Some(cmd), None) => {
                Command::Shell(interpolate(cmd, &params, &location("command"))?)
            }
            (None, Some(handle)) => Command::Script(ScriptHandle::new(handle)),
            (Some(_), Some(_)) => {
                return Err(ParseError::InvalidFormat {
                    location: location("command"),
                    message: "task declares both command and script".to_string(),
                })
            }
            (None, None) => {
                return Err(ParseError::InvalidFormat {
                    location: location("command"),
                    message: "task needs a command or a script".to_string(),
                })
            }
        };

        let retry_policy = match self.retry_policy.as_deref() {
            None | Some("fixed") => RetryPolicy::Fixed,
            Some("exponential") => RetryPolicy::Exponential,
            Some(other) => {
                return Err(ParseError::InvalidFormat {
                    location: location("retry_policy"),
                    message: format!("unknown policy {other:?} (fixed, exponential)"),
                })
            }
        };

        let retry_delay_ms = match &self.retry_delay {
            None => 1_000,
            Some(raw) => parse_duration(raw)
                .map_err(|source| ParseError::Duration {
                    location: location("retry_delay"),
                    source,
                })?
                .as_millis() as u64,
        };

        let delegate_to = match &self.delegate_to {
            None => DelegateTarget::Local,
            Some(DelegateToDef::One(agent)) => DelegateTarget::Agent(agent.clone()),
            Some(DelegateToDef::Many(agents)) => DelegateTarget::Agents(agents.clone()),
        };

        let fanout_mode = match self.mode.as_deref() {
            None | Some("parallel") => FanoutMode::Parallel,
            Some("sequential") => FanoutMode::Sequential,
            Some(other) => {
                return Err(ParseError::InvalidFormat {
                    location: location("mode"),
                    message: format!("unknown mode {other:?} (parallel, sequential)"),
                })
            }
        };

        let fanout_policy = match self.policy.as_deref() {
            None | Some("all") => FanoutPolicy::All,
            Some("any") => FanoutPolicy::Any,
            Some("majority") => FanoutPolicy::Majority,
            Some(other) => {
                return Err(ParseError::InvalidFormat {
                    location: location("policy"),
                    message: format!("unknown policy {other:?} (all, any, majority)"),
                })
            }
        };

        let workdir = match self.workdir.as_deref() {
            None | Some("inherit") => WorkdirPolicy::Inherit,
            Some("fresh") => WorkdirPolicy::Fresh,
            Some(path) => WorkdirPolicy::Named(path.into()),
        };

        let mut env = BTreeMap::new();
        for (key, value) in &self.env {
            env.insert(key.clone(), interpolate(value, &params, &location("env"))?);
        }

        let hooks = TaskHooks {
            pre_exec: parse_optional_callback(&self.pre_exec, &params, &location("pre_exec"))?,
            post_exec: parse_optional_callback(&self.post_exec, &params, &location("post_exec"))?,
            on_success: parse_optional_callback(
                &self.on_success,
                &params,
                &location("on_success"),
            )?,
            on_failure: parse_optional_callback(
                &self.on_failure,
                &params,
                &location("on_failure"),
            )?,
        };

        Ok(Task {
            id: TaskId::new(),
            name: name.to_string(),
            description: self.description.clone(),
            command,
            depends_on: self.depends_on.clone(),
            retries: self.retries,
            retry_policy,
            retry_delay_ms,
            timeout_ms: parse_timeout(&self.timeout, &location("timeout"))?,
            run_if: parse_optional_callback(&self.run_if, &params, &location("run_if"))?,
            abort_if: parse_optional_callback(&self.abort_if, &params, &location("abort_if"))?,
            next_if_fail: self.next_if_fail.clone(),
            delegate_to,
            fanout_mode,
            fanout_policy,
            artifacts: self.artifacts.clone(),
            consumes: self.consumes.clone(),
            workdir,
            params,
            env,
            hooks,
        })
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
