// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request handlers, one module per concern.

pub mod agents;
pub mod run;
pub mod stacks;

use crate::listener::MasterCtx;
use sloth_core::AgentStatus;
use sloth_wire::{MasterStatus, Response, PROTOCOL_VERSION};

/// Daemon status summary.
pub fn status(ctx: &MasterCtx) -> Response {
    let (agents_active, agents_inactive, stacks, pending_events) = ctx.store.read(|s| {
        (
            s.agents.values().filter(|a| a.status == AgentStatus::Active).count(),
            s.agents.values().filter(|a| a.status != AgentStatus::Active).count(),
            s.stacks.len(),
            s.pending_hook_events().len(),
        )
    });

    Response::Status {
        status: MasterStatus {
            version: PROTOCOL_VERSION.to_string(),
            uptime_ms: ctx.start_time.elapsed().as_millis() as u64,
            agents_active,
            agents_inactive,
            stacks,
            pending_events,
        },
    }
}
