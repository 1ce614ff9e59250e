// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task workspaces and the run artifact pool.
//!
//! A task's working directory follows its workdir policy; the directory is
//! exclusively the task's for its lifetime. Artifacts are copy-in /
//! copy-out, never shared by reference: declared artifacts are copied into
//! the run's pool after success, and consumed artifacts are staged into a
//! dependent's directory before it starts.

use crate::error::TaskError;
use sloth_core::{Task, WorkdirPolicy};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task {task:?} consumes {path:?} but no dependency produced it")]
    MissingArtifact { task: String, path: String },

    #[error("bad artifact pattern {pattern:?}: {message}")]
    BadPattern { pattern: String, message: String },
}

impl From<WorkspaceError> for TaskError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::MissingArtifact { .. } => TaskError::Validation(err.to_string()),
            other => TaskError::Internal(other.to_string()),
        }
    }
}

/// The run's artifact pool: files collected from finished tasks, staged
/// into the workspaces of tasks that consume them.
pub struct ArtifactPool {
    dir: PathBuf,
    /// Relative path to the task that produced it, for overlap warnings.
    producers: HashMap<String, String>,
}

impl ArtifactPool {
    pub fn new(dir: PathBuf) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, producers: HashMap::new() })
    }

    /// Copy a finished task's declared artifacts (glob patterns allowed)
    /// from its workspace into the pool. Returns the collected relative
    /// paths. Overlapping artifacts are last-writer-wins, with a warning
    /// naming both producers.
    pub fn collect(
        &mut self,
        task: &str,
        patterns: &[String],
        from: &Path,
    ) -> Result<Vec<String>, WorkspaceError> {
        let mut collected = Vec::new();
        for pattern in patterns {
            let full = from.join(pattern);
            let full_str = full.to_string_lossy().into_owned();
            let matches = glob::glob(&full_str).map_err(|e| WorkspaceError::BadPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;

            let mut matched_any = false;
            for entry in matches.flatten() {
                matched_any = true;
                let rel = entry
                    .strip_prefix(from)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| entry.to_string_lossy().into_owned());

                if let Some(previous) = self.producers.get(&rel) {
                    if previous != task {
                        warn!(
                            artifact = %rel,
                            previous = %previous,
                            task = %task,
                            "overlapping artifact, last writer wins"
                        );
                    }
                }

                copy_recursive(&entry, &self.dir.join(&rel))?;
                self.producers.insert(rel.clone(), task.to_string());
                collected.push(rel);
            }

            if !matched_any {
                warn!(task = %task, pattern = %pattern, "declared artifact produced no files");
            }
        }
        Ok(collected)
    }

    /// Stage consumed artifacts from the pool into a task's workspace.
    pub fn stage(
        &self,
        task: &str,
        consumes: &[String],
        into: &Path,
    ) -> Result<(), WorkspaceError> {
        for path in consumes {
            let source = self.dir.join(path);
            if !source.exists() {
                return Err(WorkspaceError::MissingArtifact {
                    task: task.to_string(),
                    path: path.clone(),
                });
            }
            copy_recursive(&source, &into.join(path))?;
        }
        Ok(())
    }

    /// Whether the pool holds an artifact at this relative path.
    pub fn contains(&self, rel: &str) -> bool {
        self.producers.contains_key(rel)
    }

    /// Pool directory (for delegated execution, which tars staged input).
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Per-run workspace layout.
pub struct RunWorkspace {
    /// The workflow's base directory (`workdir = "inherit"`).
    base: PathBuf,
    /// Private run directory holding fresh task dirs and the pool.
    run_dir: PathBuf,
    pool: ArtifactPool,
}

impl RunWorkspace {
    pub fn new(base: PathBuf, run_dir: PathBuf) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(&run_dir)?;
        let pool = ArtifactPool::new(run_dir.join("artifacts"))?;
        Ok(Self { base, run_dir, pool })
    }

    /// Resolve and prepare a task's working directory.
    ///
    /// `fresh` directories are recreated empty on every attempt, so a
    /// retry never sees the previous attempt's leftovers.
    pub fn prepare_task_dir(&self, task: &Task) -> Result<PathBuf, WorkspaceError> {
        match &task.workdir {
            WorkdirPolicy::Inherit => Ok(self.base.clone()),
            WorkdirPolicy::Fresh => {
                let dir = self.run_dir.join("tasks").join(&task.name);
                if dir.exists() {
                    std::fs::remove_dir_all(&dir)?;
                }
                std::fs::create_dir_all(&dir)?;
                Ok(dir)
            }
            WorkdirPolicy::Named(path) => {
                let dir =
                    if path.is_absolute() { path.clone() } else { self.base.join(path) };
                std::fs::create_dir_all(&dir)?;
                Ok(dir)
            }
        }
    }

    pub fn pool(&self) -> &ArtifactPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ArtifactPool {
        &mut self.pool
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Remove the run directory (fresh dirs and pool).
    pub fn cleanup(&self) -> Result<(), WorkspaceError> {
        if self.run_dir.exists() {
            std::fs::remove_dir_all(&self.run_dir)?;
        }
        Ok(())
    }
}

fn copy_recursive(src: &Path, dst: &Path) -> Result<(), std::io::Error> {
    if src.is_dir() {
        std::fs::create_dir_all(dst)?;
        for entry in std::fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dst.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(src, dst)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
