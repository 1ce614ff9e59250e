// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation of a task group.
//!
//! Runs before execution; a workflow that fails here never acquires a lock
//! or schedules a task.

use sloth_core::{DelegateTarget, TaskGroup};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("task {task:?} depends on unknown task {dependency:?}")]
    UnknownDependency { task: String, dependency: String },

    #[error("task {task:?} names unknown task {target:?} in next_if_fail")]
    UnknownNextIfFail { task: String, target: String },

    #[error("task {task:?} depends on itself")]
    SelfDependency { task: String },

    #[error("dependency cycle involving tasks: {tasks}")]
    DependencyCycle { tasks: String },

    #[error("task {task:?} delegates to an empty agent list")]
    EmptyDelegateList { task: String },
}

/// Validate the dependency graph: names resolve within the group, no task
/// depends on itself, and the graph is acyclic.
pub fn validate_group(group: &TaskGroup) -> Result<(), ValidationError> {
    let names: HashSet<&str> = group.tasks.iter().map(|t| t.name.as_str()).collect();

    for task in &group.tasks {
        for dep in &task.depends_on {
            if dep == &task.name {
                return Err(ValidationError::SelfDependency { task: task.name.clone() });
            }
            if !names.contains(dep.as_str()) {
                return Err(ValidationError::UnknownDependency {
                    task: task.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        for target in &task.next_if_fail {
            if !names.contains(target.as_str()) {
                return Err(ValidationError::UnknownNextIfFail {
                    task: task.name.clone(),
                    target: target.clone(),
                });
            }
        }
        if let DelegateTarget::Agents(agents) = &task.delegate_to {
            if agents.is_empty() {
                return Err(ValidationError::EmptyDelegateList { task: task.name.clone() });
            }
        }
    }

    detect_cycle(group)
}

/// Kahn's algorithm; whatever cannot be topologically ordered is cyclic.
fn detect_cycle(group: &TaskGroup) -> Result<(), ValidationError> {
    let mut in_degree: HashMap<&str, usize> =
        group.tasks.iter().map(|t| (t.name.as_str(), t.depends_on.len())).collect();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in &group.tasks {
        for dep in &task.depends_on {
            dependents.entry(dep.as_str()).or_default().push(task.name.as_str());
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut resolved = 0usize;

    while let Some(name) = ready.pop() {
        resolved += 1;
        for dependent in dependents.get(name).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(dependent) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
        }
    }

    if resolved < group.tasks.len() {
        let mut stuck: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| *name)
            .collect();
        stuck.sort_unstable();
        return Err(ValidationError::DependencyCycle { tasks: stuck.join(", ") });
    }

    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
