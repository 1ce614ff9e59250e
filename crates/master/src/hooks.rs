// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook event queue dispatch.
//!
//! Lifecycle transitions enqueue events; this module drains the queue and
//! runs every registered hook whose subscription matches. Events move
//! `pending` to `processing` before dispatch, then `completed` or
//! `failed`; a crash mid-dispatch leaves a `processing` row, re-queued at
//! the next startup sweep.

use sloth_core::{Clock, HookDef, HookEvent, HookEventStatus, StoreEvent};
use sloth_engine::run_shell;
use sloth_storage::{Store, StoreError};
use sloth_wire::RunReport;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Deadline for a single hook command.
const HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Hook definition file grammar: `hook "name" { events = [...], command = "..." }`.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct HooksFile {
    #[serde(default, alias = "hook")]
    hooks: indexmap::IndexMap<String, HookBlock>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct HookBlock {
    #[serde(default)]
    events: Vec<String>,
    command: String,
}

/// Parse a hooks definition file (HCL).
pub fn parse_hooks_file(source: &str) -> Result<Vec<HookDef>, hcl::Error> {
    let file: HooksFile = hcl::from_str(source)?;
    Ok(file
        .hooks
        .into_iter()
        .map(|(name, block)| HookDef {
            name,
            events: if block.events.is_empty() { vec!["*".to_string()] } else { block.events },
            command: block.command,
        })
        .collect())
}

/// Enqueue the lifecycle events a finished run produces.
pub fn enqueue_run_events(
    store: &Arc<Store>,
    report: &RunReport,
    clock: &impl Clock,
) -> Result<(), StoreError> {
    let now_ms = clock.epoch_ms();
    let mut events = Vec::new();

    for (name, task) in &report.tasks {
        let event_type = format!("task.{}", task.status);
        events.push(StoreEvent::HookEventEnqueued {
            event: HookEvent::new(
                event_type,
                serde_json::json!({
                    "task": name,
                    "workflow": report.workflow,
                    "stack": report.stack.name,
                    "run_id": report.run_id,
                    "status": task.status,
                    "error": task.error,
                }),
                now_ms,
            ),
        });
    }

    let workflow_event = if report.success() { "workflow.completed" } else { "workflow.failed" };
    events.push(StoreEvent::HookEventEnqueued {
        event: HookEvent::new(
            workflow_event,
            serde_json::json!({
                "workflow": report.workflow,
                "stack": report.stack.name,
                "run_id": report.run_id,
                "status": report.status,
                "duration_ms": report.duration_ms,
                "error": report.error,
            }),
            now_ms,
        ),
    });

    store.commit(events)
}

/// Drain pending events until the shutdown token fires.
pub async fn drain_loop(
    store: Arc<Store>,
    clock: impl Clock,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => return,
        }
        if let Err(e) = drain_once(&store, &clock).await {
            warn!(error = %e, "hook drain failed");
        }
    }
}

/// Dispatch every pending event once. Returns how many were processed.
pub async fn drain_once(store: &Arc<Store>, clock: &impl Clock) -> Result<usize, StoreError> {
    let pending: Vec<HookEvent> =
        store.read(|s| s.pending_hook_events().into_iter().cloned().collect());
    if pending.is_empty() {
        return Ok(0);
    }

    let hooks: Vec<HookDef> = store.read(|s| s.hooks.values().cloned().collect());
    let count = pending.len();

    for event in pending {
        store.commit_one(StoreEvent::HookEventStatusChanged {
            id: event.id,
            status: HookEventStatus::Processing,
            error: None,
            at_ms: clock.epoch_ms(),
        })?;

        let matching: Vec<&HookDef> =
            hooks.iter().filter(|h| h.matches(&event.event_type)).collect();
        debug!(
            event = %event.event_type,
            hooks = matching.len(),
            "dispatching hook event"
        );

        let mut failure: Option<String> = None;
        for hook in matching {
            let mut env = BTreeMap::new();
            env.insert("SLOTH_EVENT_TYPE".to_string(), event.event_type.clone());
            env.insert("SLOTH_EVENT".to_string(), event.payload.to_string());

            match run_shell(&hook.command, &std::env::temp_dir(), &env, HOOK_TIMEOUT).await {
                Ok(output) if output.success() => {}
                Ok(output) => {
                    failure = Some(format!(
                        "hook {:?} exited with code {}",
                        hook.name, output.exit_code
                    ));
                }
                Err(e) => failure = Some(format!("hook {:?} failed: {e}", hook.name)),
            }
        }

        let (status, error) = match failure {
            None => (HookEventStatus::Completed, None),
            Some(message) => (HookEventStatus::Failed, Some(message)),
        };
        store.commit_one(StoreEvent::HookEventStatusChanged {
            id: event.id,
            status,
            error,
            at_ms: clock.epoch_ms(),
        })?;
    }

    Ok(count)
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
