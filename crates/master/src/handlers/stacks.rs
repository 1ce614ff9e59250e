// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack and state management handlers.

use crate::listener::MasterCtx;
use sloth_core::ObservedResource;
use sloth_engine::StackError;
use sloth_wire::{RequestErrorKind, Response, StackDetail, StackSummary, VersionSummary};

fn stack_error(e: StackError) -> Response {
    let kind = match &e {
        StackError::NotFound(_) | StackError::VersionNotFound { .. } => {
            RequestErrorKind::NotFound
        }
        StackError::Locked { .. } => RequestErrorKind::Locked,
        StackError::NameTaken(_) => RequestErrorKind::Invalid,
        StackError::Store(_) => RequestErrorKind::Internal,
    };
    Response::error(kind, e.to_string())
}

pub fn list(ctx: &MasterCtx) -> Response {
    let stacks = ctx
        .runner
        .stacks()
        .list()
        .into_iter()
        .map(|stack| StackSummary {
            id: stack.id.to_string(),
            name: stack.name,
            version: stack.version,
            status: stack.status,
            resources: stack.resources.len(),
            locked_by: stack.locked_by,
            completed_at_ms: stack.completed_at_ms,
        })
        .collect();
    Response::Stacks { stacks }
}

pub fn show(ctx: &MasterCtx, key: &str) -> Response {
    match ctx.runner.stacks().get(key) {
        Ok(stack) => Response::Stack { stack: StackDetail { stack } },
        Err(e) => stack_error(e),
    }
}

pub fn delete(ctx: &MasterCtx, key: &str) -> Response {
    match ctx.runner.stacks().delete(key) {
        Ok(()) => Response::Ok,
        Err(e) => stack_error(e),
    }
}

pub fn versions(ctx: &MasterCtx, key: &str) -> Response {
    match ctx.runner.stacks().versions(key) {
        Ok(versions) => Response::Versions {
            versions: versions
                .into_iter()
                .map(|v| VersionSummary {
                    version: v.version,
                    status: v.status,
                    description: v.description,
                    resources: v.resources.len(),
                    created_at_ms: v.created_at_ms,
                })
                .collect(),
        },
        Err(e) => stack_error(e),
    }
}

pub fn rollback(ctx: &MasterCtx, key: &str, version: u64, force: bool) -> Response {
    match ctx.runner.stacks().rollback(key, version, force) {
        Ok(stack) => Response::Stack { stack: StackDetail { stack } },
        Err(e) => stack_error(e),
    }
}

pub fn drift(ctx: &MasterCtx, key: &str, observed: &[ObservedResource]) -> Response {
    match ctx.runner.stacks().drift(key, observed) {
        Ok(report) => Response::Drift { report },
        Err(e) => stack_error(e),
    }
}
