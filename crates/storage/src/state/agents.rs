// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent table event handlers.

use super::StoreState;
use sloth_core::{AgentStatus, StoreEvent};

pub(super) fn apply(state: &mut StoreState, event: &StoreEvent) {
    match event {
        StoreEvent::AgentRegistered { record } => {
            // Upsert: re-registration replaces the record wholesale. The
            // record already carries Active status and a fresh heartbeat.
            state.agents.insert(record.name.clone(), record.clone());
        }

        StoreEvent::AgentHeartbeat { name, at_ms } => {
            if let Some(agent) = state.agents.get_mut(name) {
                agent.last_heartbeat_ms = *at_ms;
                agent.status = AgentStatus::Active;
                agent.inactive_reason = None;
            }
        }

        StoreEvent::AgentMarkedInactive { name, reason, .. } => {
            if let Some(agent) = state.agents.get_mut(name) {
                if agent.status != AgentStatus::Inactive {
                    agent.status = AgentStatus::Inactive;
                    agent.inactive_reason = Some(reason.clone());
                }
            }
        }

        StoreEvent::AgentRemoved { name } => {
            state.agents.remove(name);
        }

        _ => {}
    }
}
