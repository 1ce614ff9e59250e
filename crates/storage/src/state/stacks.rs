// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stack table event handlers.
//!
//! Version monotonicity is enforced here: a snapshot only applies when its
//! version is exactly one past the stack's current version, which also
//! makes replay of an already-applied event a no-op.

use super::StoreState;
use sloth_core::{StackStatus, StoreEvent};

pub(super) fn apply(state: &mut StoreState, event: &StoreEvent) {
    match event {
        StoreEvent::StackCreated { stack } => {
            if !state.stacks.contains_key(stack.id.as_str()) {
                state.stacks.insert(stack.id.to_string(), stack.clone());
            }
        }

        StoreEvent::StackRunStarted { stack_id, run, holder, at_ms } => {
            if let Some(stack) = state.stacks.get_mut(stack_id.as_str()) {
                stack.status = StackStatus::Running;
                stack.started_at_ms = Some(*at_ms);
                stack.completed_at_ms = None;
                stack.duration_ms = None;
                stack.error = None;
                stack.locked_by = Some(holder.clone());
                if !stack.history.iter().any(|r| r.run_id == run.run_id) {
                    stack.history.push(run.clone());
                }
            }
        }

        StoreEvent::StackResourceRecorded { stack_id, resource } => {
            if let Some(stack) = state.stacks.get_mut(stack_id.as_str()) {
                stack.record_resource(resource.clone());
            }
        }

        StoreEvent::StackOutputRecorded { stack_id, key, value } => {
            if let Some(stack) = state.stacks.get_mut(stack_id.as_str()) {
                stack.outputs.insert(key.clone(), value.clone());
            }
        }

        StoreEvent::StackRunFinished { stack_id, run_id, status, error, version, at_ms } => {
            if let Some(stack) = state.stacks.get_mut(stack_id.as_str()) {
                if version.version == stack.version + 1 {
                    stack.version = version.version;
                    stack.status = *status;
                    stack.completed_at_ms = Some(*at_ms);
                    stack.duration_ms =
                        stack.started_at_ms.map(|started| at_ms.saturating_sub(started));
                    stack.error = error.clone();
                    stack.locked_by = None;
                    state
                        .versions
                        .entry(stack_id.to_string())
                        .or_default()
                        .push(version.clone());
                }
                if let Some(record) =
                    stack.history.iter_mut().find(|r| r.run_id == *run_id)
                {
                    if record.finished_at_ms.is_none() {
                        record.finished_at_ms = Some(*at_ms);
                        record.status = *status;
                        record.error = error.clone();
                    }
                }
            }
        }

        StoreEvent::StackRolledBack { stack_id, version, at_ms, .. } => {
            if let Some(stack) = state.stacks.get_mut(stack_id.as_str()) {
                if version.version == stack.version + 1 {
                    stack.version = version.version;
                    stack.status = StackStatus::RolledBack;
                    stack.resources = version.resources.clone();
                    stack.outputs = version.outputs.clone();
                    stack.completed_at_ms = Some(*at_ms);
                    stack.error = None;
                    stack.locked_by = None;
                    state
                        .versions
                        .entry(stack_id.to_string())
                        .or_default()
                        .push(version.clone());
                }
            }
        }

        StoreEvent::StackDeleted { stack_id } => {
            // Cascade: versions go with the stack.
            state.stacks.remove(stack_id.as_str());
            state.versions.remove(stack_id.as_str());
        }

        _ => {}
    }
}
