// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock table event handlers.

use super::StoreState;
use sloth_core::StoreEvent;

pub(super) fn apply(state: &mut StoreState, event: &StoreEvent) {
    match event {
        StoreEvent::LockAcquired { lock } => {
            // Overwrite covers both renewal by the same holder and a forced
            // steal of an expired lock. Contention checks happen before the
            // event is committed.
            state.locks.insert(lock.name.clone(), lock.clone());
        }

        StoreEvent::LockRefreshed { name, holder, expires_at_ms } => {
            if let Some(lock) = state.locks.get_mut(name) {
                if lock.holder == *holder {
                    lock.expires_at_ms = *expires_at_ms;
                }
            }
        }

        StoreEvent::LockReleased { name, holder } => {
            // Holder check: a release raced with a steal must not drop the
            // thief's lock.
            if state.locks.get(name).is_some_and(|l| l.holder == *holder) {
                state.locks.remove(name);
            }
        }

        _ => {}
    }
}
