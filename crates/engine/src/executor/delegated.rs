// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-agent delegation.

use super::{ExecutionContext, TaskOutcome};
use crate::archive::{pack_dir, unpack_into};
use crate::error::TaskError;
use sloth_wire::TaskEnvelope;

pub(super) async fn execute(
    agent: &str,
    task: &sloth_core::Task,
    ctx: &ExecutionContext,
) -> Result<TaskOutcome, TaskError> {
    let address = ctx.resolver.resolve(agent).await?;

    // The workspace (with staged consumes) travels as a tar blob.
    let workspace = pack_dir(&ctx.workdir)
        .map_err(|e| TaskError::Internal(format!("workspace pack failed: {e}")))?;

    // Strip delegation before shipping; the task must run locally on the
    // agent, never hop again.
    let mut shipped = task.clone();
    shipped.delegate_to.clear();
    let envelope = TaskEnvelope { task: shipped, dep_outputs: ctx.dep_outputs.clone() };

    let result = ctx
        .channel
        .run_task(
            &address,
            envelope,
            ctx.run.clone(),
            workspace,
            &ctx.logger,
            &ctx.cancel,
            ctx.timeout,
        )
        .await?;

    if !result.success {
        return Err(TaskError::Execution(result.message));
    }

    // Artifacts come home into the task's workspace, where the collector
    // will pick up whatever the task declared.
    unpack_into(&result.artifacts, &ctx.workdir)
        .map_err(|e| TaskError::Internal(format!("artifact unpack failed: {e}")))?;

    Ok(TaskOutcome {
        message: result.message,
        outputs: result.outputs,
        agents: vec![agent.to_string()],
    })
}
