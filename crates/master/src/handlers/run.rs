// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run handler.

use crate::hooks;
use crate::listener::MasterCtx;
use sloth_core::SystemClock;
use sloth_engine::{RunRequest, StackError};
use sloth_wire::{RequestErrorKind, Response};
use sloth_workflow::{definition_hash, parse_workflow_with_format, Format};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct RunParams {
    pub stack: String,
    pub source: String,
    pub format: String,
    pub workflow: Option<String>,
    pub params: BTreeMap<String, String>,
    pub base_dir: PathBuf,
    pub force: bool,
}

/// Parse, validate, and execute a workflow against a stack.
///
/// Definition problems come back as `invalid` before anything runs; lock
/// contention as `locked`. Task failures are a normal `Run` response with
/// a failed report.
pub async fn handle(ctx: &MasterCtx, params: RunParams, cancel: CancellationToken) -> Response {
    let Some(format) = Format::from_name(&params.format) else {
        return Response::error(
            RequestErrorKind::Invalid,
            format!("unknown definition format {:?}", params.format),
        );
    };

    let file = match parse_workflow_with_format(&params.source, format) {
        Ok(file) => file,
        Err(e) => return Response::error(RequestErrorKind::Invalid, e.to_string()),
    };

    let group = match file
        .select(params.workflow.as_deref())
        .and_then(|(name, def)| def.to_group(name, &params.params))
    {
        Ok(group) => group,
        Err(e) => return Response::error(RequestErrorKind::Invalid, e.to_string()),
    };

    let request = RunRequest {
        group,
        stack: params.stack,
        params: params.params,
        definition_hash: definition_hash(&params.source),
        base_dir: params.base_dir,
        run_root: ctx.config.runs_dir.clone(),
        force_lock: params.force,
    };

    match ctx.runner.run(request, cancel).await {
        Ok(report) => {
            if let Err(e) = hooks::enqueue_run_events(&ctx.store, &report, &SystemClock) {
                warn!(error = %e, "failed to enqueue run events");
            }
            Response::Run { report }
        }
        Err(e @ StackError::Locked { .. }) => {
            Response::error(RequestErrorKind::Locked, e.to_string())
        }
        Err(e) => Response::error(RequestErrorKind::Internal, e.to_string()),
    }
}
