// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process execution.

use super::{ExecutionContext, TaskOutcome};
use crate::error::TaskError;
use crate::subprocess::run_shell_streaming;
use sloth_core::{Command, ScriptError, Task};

pub(super) async fn execute(
    task: &Task,
    ctx: &ExecutionContext,
) -> Result<TaskOutcome, TaskError> {
    match &task.command {
        Command::Shell(command) => {
            let code = run_shell_streaming(
                command,
                &ctx.workdir,
                &ctx.env,
                ctx.timeout,
                &ctx.cancel,
                &ctx.logger,
            )
            .await?;
            if code == 0 {
                Ok(TaskOutcome::default())
            } else {
                Err(TaskError::Execution(format!("command exited with code {code}")))
            }
        }
        Command::Script(handle) => {
            // The script runtime is synchronous; keep it off the scheduler.
            let script = ctx.script.clone();
            let handle = handle.clone();
            let params = ctx.params.clone();
            let dep_outputs = ctx.dep_outputs.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                script.invoke(&handle, &params, &dep_outputs)
            })
            .await
            .map_err(|e| TaskError::Internal(format!("script task panicked: {e}")))?
            .map_err(|e| match e {
                ScriptError::UnknownHandle(_) | ScriptError::RuntimeUnavailable => {
                    TaskError::Validation(e.to_string())
                }
                ScriptError::Failed(message) => TaskError::Execution(message),
            })?;

            if outcome.success {
                Ok(TaskOutcome {
                    message: outcome.message,
                    outputs: outcome.outputs,
                    agents: Vec::new(),
                })
            } else {
                Err(TaskError::Execution(outcome.message))
            }
        }
    }
}
