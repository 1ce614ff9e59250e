// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook and event queue table handlers.

use super::StoreState;
use sloth_core::StoreEvent;

pub(super) fn apply(state: &mut StoreState, event: &StoreEvent) {
    match event {
        StoreEvent::HookRegistered { def } => {
            state.hooks.insert(def.name.clone(), def.clone());
        }

        StoreEvent::HookRemoved { name } => {
            state.hooks.remove(name);
        }

        StoreEvent::HookEventEnqueued { event } => {
            if !state.events.contains_key(event.id.as_str()) {
                state.events.insert(event.id.to_string(), event.clone());
            }
        }

        StoreEvent::HookEventStatusChanged { id, status, error, at_ms } => {
            if let Some(entry) = state.events.get_mut(id.as_str()) {
                entry.status = *status;
                entry.error = error.clone();
                entry.updated_at_ms = *at_ms;
            }
        }

        _ => {}
    }
}
