// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Master startup and shutdown.
//!
//! Startup acquires an exclusive lock on the data directory, recovers the
//! store (snapshot + WAL replay), finalises runs a previous process left
//! dangling, and loads the registered hooks file. Shutdown finalises
//! in-flight runs as interrupted and releases the daemon lock.

use crate::config::Config;
use fs2::FileExt;
use sloth_core::{Clock, StackStatus, StoreEvent, SystemClock};
use sloth_storage::{Store, StoreError};
use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("another master owns {0}")]
    LockFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("no usable data directory")]
    NoDataDir,
}

/// A started master: the store plus the instance lock keeping it exclusive.
pub struct MasterDaemon {
    pub store: Arc<Store>,
    pub config: Config,
    // NOTE(lifetime): dropping the handle releases the flock.
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the instance lock and recover the store.
pub fn startup(config: &Config) -> Result<MasterDaemon, LifecycleError> {
    std::fs::create_dir_all(&config.data_dir)?;

    let mut lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.display().to_string()))?;
    let _ = writeln!(lock_file, "{}", std::process::id());

    let store = Arc::new(Store::open(&config.state_dir)?);

    // Runs a previous process never finished: fail them now, releasing
    // their locks, before anything else sees the stacks as running.
    finalize_interrupted(&store, &SystemClock, "interrupted")?;

    load_hooks_file(&store, config)?;

    Ok(MasterDaemon { store, config: config.clone(), lock_file })
}

/// Finalise every running stack as failed with the given reason.
///
/// Used at startup (crash recovery) and at shutdown (runs cancelled by
/// the exiting master).
pub fn finalize_interrupted(
    store: &Arc<Store>,
    clock: &impl Clock,
    reason: &str,
) -> Result<usize, StoreError> {
    let running: Vec<(sloth_core::StackId, Option<String>, Option<sloth_core::RunId>)> =
        store.read(|s| {
            s.stacks
                .values()
                .filter(|stack| stack.status == StackStatus::Running)
                .map(|stack| {
                    let open_run = stack
                        .history
                        .iter()
                        .rev()
                        .find(|r| r.finished_at_ms.is_none())
                        .map(|r| r.run_id);
                    (stack.id, stack.locked_by.clone(), open_run)
                })
                .collect()
        });

    let count = running.len();
    for (stack_id, holder, run_id) in running {
        warn!(stack = %stack_id, reason, "finalising interrupted run");
        let now_ms = clock.epoch_ms();
        let Some(stack) = store.read(|s| s.stack(stack_id.as_str()).cloned()) else {
            continue;
        };
        let mut snapshot_source = stack.clone();
        snapshot_source.status = StackStatus::Failed;
        let version =
            snapshot_source.snapshot(stack.version + 1, format!("run {reason}"), now_ms);

        let mut events = vec![StoreEvent::StackRunFinished {
            stack_id,
            run_id: run_id.unwrap_or_default(),
            status: StackStatus::Failed,
            error: Some(reason.to_string()),
            version,
            at_ms: now_ms,
        }];
        if let Some(holder) = holder {
            events.push(StoreEvent::LockReleased { name: stack_id.to_string(), holder });
        }
        store.commit(events)?;
    }
    Ok(count)
}

/// Load `hooks.hcl` (same block grammar as workflow files) and replace the
/// registered hooks table with its contents. A missing file clears
/// nothing; a malformed one is logged and skipped.
fn load_hooks_file(store: &Arc<Store>, config: &Config) -> Result<(), StoreError> {
    let source = match std::fs::read_to_string(&config.hooks_path) {
        Ok(source) => source,
        Err(_) => return Ok(()),
    };

    match crate::hooks::parse_hooks_file(&source) {
        Ok(defs) => {
            info!(count = defs.len(), "loaded registered hooks");
            for def in defs {
                store.commit_one(StoreEvent::HookRegistered { def })?;
            }
            Ok(())
        }
        Err(e) => {
            warn!(path = %config.hooks_path.display(), error = %e, "ignoring bad hooks file");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
