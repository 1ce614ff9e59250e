// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency graph resolution.
//!
//! A task waits on its `depends_on` set, plus on every task that names it
//! in `next_if_fail` (a failure handler cannot fire before its trigger
//! settles). A dependency that succeeds, or is skipped by its own
//! condition, releases a normal dependent. A failed dependency releases
//! only the handlers listed in its `next_if_fail`; every other dependent
//! is skipped, and that skip poisons: dependents further downstream are
//! skipped too, instead of sailing through a hole the failure punched in
//! the graph.

use sloth_core::{TaskGroup, TaskStatus};
use std::collections::{HashMap, HashSet};

/// What the scheduler may do with a pending task right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// All gates settled the right way; schedule it.
    Ready,
    /// At least one gate is still open.
    Blocked,
    /// A gate settled the wrong way, but permissively (condition skip or
    /// unfired failure handler); mark skipped without poisoning.
    Skip,
    /// A gate failed (or was poisoned); mark skipped and poison
    /// dependents.
    SkipPoisoned,
}

/// One task's gates, precomputed from the group.
#[derive(Debug, Clone)]
struct Gates {
    /// Gating task name, paired with whether this task fires on its
    /// failure (true) or on its success (false).
    on: Vec<(String, bool)>,
}

/// Precomputed scheduling view of a task group.
///
/// Assumes the group already passed structural validation; an unvalidated
/// cyclic graph would simply never become ready.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Definition order, the scheduling tie-breaker.
    order: Vec<String>,
    gates: HashMap<String, Gates>,
}

impl TaskGraph {
    pub fn build(group: &TaskGroup) -> Self {
        let mut gates: HashMap<String, Gates> = group
            .tasks
            .iter()
            .map(|task| {
                let on = task
                    .depends_on
                    .iter()
                    .map(|dep| (dep.clone(), false))
                    .collect::<Vec<_>>();
                (task.name.clone(), Gates { on })
            })
            .collect();

        // A task named in X's next_if_fail gains X as a failure-polarity
        // gate (replacing the normal gate if it also depends on X).
        for task in &group.tasks {
            for handler in &task.next_if_fail {
                if let Some(entry) = gates.get_mut(handler) {
                    entry.on.retain(|(name, _)| name != &task.name);
                    entry.on.push((task.name.clone(), true));
                }
            }
        }

        Self { order: group.tasks.iter().map(|t| t.name.clone()).collect(), gates }
    }

    /// Assess one pending task against the current status map.
    ///
    /// `poisoned` holds tasks skipped by failure propagation; their skips
    /// block normal dependents the way a failure would.
    pub fn assess(
        &self,
        name: &str,
        states: &HashMap<String, TaskStatus>,
        poisoned: &HashSet<String>,
    ) -> Readiness {
        let Some(gates) = self.gates.get(name) else {
            return Readiness::Blocked;
        };

        let mut ready = Readiness::Ready;
        for (gate, fires_on_failure) in &gates.on {
            let status = states.get(gate.as_str()).copied().unwrap_or(TaskStatus::Pending);
            let gate_poisoned = poisoned.contains(gate.as_str());
            if !*fires_on_failure {
                match status {
                    TaskStatus::Success => {}
                    TaskStatus::Skipped if !gate_poisoned => {}
                    TaskStatus::Failed => return Readiness::SkipPoisoned,
                    TaskStatus::Skipped => return Readiness::SkipPoisoned,
                    TaskStatus::Pending | TaskStatus::Running => ready = Readiness::Blocked,
                }
            } else {
                match status {
                    TaskStatus::Failed => {}
                    // The trigger settled without failing: the handler
                    // never fires, which is not itself a failure.
                    TaskStatus::Success | TaskStatus::Skipped => return Readiness::Skip,
                    TaskStatus::Pending | TaskStatus::Running => ready = Readiness::Blocked,
                }
            }
        }
        ready
    }

    /// Pending tasks to schedule now (definition order) and pending tasks
    /// whose gates settled the wrong way, paired with the poison flag.
    pub fn ready_and_skips(
        &self,
        states: &HashMap<String, TaskStatus>,
        poisoned: &HashSet<String>,
    ) -> (Vec<String>, Vec<(String, bool)>) {
        let mut ready = Vec::new();
        let mut skips = Vec::new();
        for name in &self.order {
            if states.get(name.as_str()).copied() != Some(TaskStatus::Pending) {
                continue;
            }
            match self.assess(name, states, poisoned) {
                Readiness::Ready => ready.push(name.clone()),
                Readiness::Skip => skips.push((name.clone(), false)),
                Readiness::SkipPoisoned => skips.push((name.clone(), true)),
                Readiness::Blocked => {}
            }
        }
        (ready, skips)
    }

    /// Tasks in definition order.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
