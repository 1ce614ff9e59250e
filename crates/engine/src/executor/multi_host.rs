// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Multi-host fan-out.
//!
//! The task ships to every listed agent; the fan-out policy decides group
//! success. Each host's output is tagged with the agent name, host outputs
//! merge namespaced as `<agent>.<key>`, and artifacts from successful
//! hosts unpack in agent-list order (last writer wins).

use super::{ExecutionContext, TaskOutcome};
use crate::archive::{pack_dir, unpack_into};
use crate::channel::DelegatedResult;
use crate::error::TaskError;
use sloth_core::{FanoutMode, FanoutPolicy, Task};
use sloth_wire::TaskEnvelope;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

type HostResult = (String, Result<DelegatedResult, TaskError>);

pub(super) async fn execute(
    agents: &[String],
    task: &Task,
    ctx: &ExecutionContext,
) -> Result<TaskOutcome, TaskError> {
    let workspace = Arc::new(
        pack_dir(&ctx.workdir)
            .map_err(|e| TaskError::Internal(format!("workspace pack failed: {e}")))?,
    );

    let mut shipped = task.clone();
    shipped.delegate_to.clear();
    let envelope = TaskEnvelope { task: shipped, dep_outputs: ctx.dep_outputs.clone() };

    let results = match task.fanout_mode {
        FanoutMode::Parallel => {
            run_parallel(agents, &envelope, Arc::clone(&workspace), ctx).await
        }
        FanoutMode::Sequential => {
            run_sequential(agents, &envelope, &workspace, ctx, task.fanout_policy).await
        }
    };

    settle(task, ctx, results)
}

async fn run_one(
    agent: String,
    envelope: TaskEnvelope,
    workspace: Arc<Vec<u8>>,
    ctx: ExecutionContext,
) -> HostResult {
    let logger = ctx.logger.with_tag(&agent);
    let result = async {
        let address = ctx.resolver.resolve(&agent).await?;
        ctx.channel
            .run_task(
                &address,
                envelope,
                ctx.run.clone(),
                workspace.as_ref().clone(),
                &logger,
                &ctx.cancel,
                ctx.timeout,
            )
            .await
    }
    .await;
    (agent, result)
}

async fn run_parallel(
    agents: &[String],
    envelope: &TaskEnvelope,
    workspace: Arc<Vec<u8>>,
    ctx: &ExecutionContext,
) -> Vec<HostResult> {
    let mut join_set = tokio::task::JoinSet::new();
    for agent in agents {
        join_set.spawn(run_one(
            agent.clone(),
            envelope.clone(),
            Arc::clone(&workspace),
            ctx.clone(),
        ));
    }

    let mut results = Vec::with_capacity(agents.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => {
                results.push((
                    "<join>".to_string(),
                    Err(TaskError::Internal(format!("fan-out worker failed: {e}"))),
                ));
            }
        }
    }
    // Agent-list order, not completion order, for deterministic merging.
    results.sort_by_key(|(agent, _)| agents.iter().position(|a| a == agent));
    results
}

async fn run_sequential(
    agents: &[String],
    envelope: &TaskEnvelope,
    workspace: &Arc<Vec<u8>>,
    ctx: &ExecutionContext,
    policy: FanoutPolicy,
) -> Vec<HostResult> {
    let mut results = Vec::with_capacity(agents.len());
    for agent in agents {
        let result = run_one(
            agent.clone(),
            envelope.clone(),
            Arc::clone(workspace),
            ctx.clone(),
        )
        .await;
        let succeeded = matches!(&result.1, Ok(r) if r.success);
        results.push(result);

        // Sequential short-circuits where the policy's verdict is already
        // known: `any` stops at the first success, `all` at the first
        // failure. `majority` needs every host.
        match policy {
            FanoutPolicy::Any if succeeded => break,
            FanoutPolicy::All if !succeeded => break,
            _ => {}
        }
    }
    results
}

fn settle(
    task: &Task,
    ctx: &ExecutionContext,
    results: Vec<HostResult>,
) -> Result<TaskOutcome, TaskError> {
    let total = results.len();
    let successes: Vec<&(String, Result<DelegatedResult, TaskError>)> =
        results.iter().filter(|(_, r)| matches!(r, Ok(d) if d.success)).collect();

    let group_ok = match task.fanout_policy {
        FanoutPolicy::All => successes.len() == total && total > 0,
        FanoutPolicy::Any => !successes.is_empty(),
        FanoutPolicy::Majority => successes.len() * 2 > total,
    };

    if !group_ok {
        let mut failures = Vec::new();
        for (agent, result) in &results {
            match result {
                Ok(d) if d.success => {}
                Ok(d) => failures.push(format!("{agent}: {}", d.message)),
                Err(e) => failures.push(format!("{agent}: {e}")),
            }
        }
        return Err(TaskError::Execution(format!(
            "fan-out policy {} not met ({}/{} hosts succeeded): {}",
            task.fanout_policy,
            successes.len(),
            total,
            failures.join("; "),
        )));
    }

    // Merge outputs per host, namespaced, and bring artifacts home in
    // agent-list order.
    let mut outputs = BTreeMap::new();
    let mut agents_run = Vec::new();
    for (agent, result) in &results {
        if let Ok(delegated) = result {
            if !delegated.success {
                continue;
            }
            agents_run.push(agent.clone());
            for (key, value) in &delegated.outputs {
                outputs.insert(format!("{agent}.{key}"), value.clone());
            }
            if !delegated.artifacts.is_empty() {
                if let Err(e) = unpack_into(&delegated.artifacts, &ctx.workdir) {
                    warn!(agent = %agent, error = %e, "artifact unpack failed for host");
                }
            }
        }
    }

    Ok(TaskOutcome {
        message: format!("{}/{} hosts succeeded", successes.len(), total),
        outputs,
        agents: agents_run,
    })
}
