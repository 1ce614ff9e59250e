// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-side task workspaces.
//!
//! Every `ExecuteTask` gets a private directory: the shipped workspace
//! archive unpacks into it, the command runs there, and the declared
//! artifacts are collected back into a tar blob for the result frame.

use flate2::read::GzDecoder;
use sloth_wire::{sniff_archive_kind, ArchiveKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A task's private directory, removed on drop.
pub(crate) struct TaskWorkspace {
    dir: PathBuf,
}

impl TaskWorkspace {
    /// Create a fresh workspace and unpack the shipped archive into it.
    pub fn unpack(run_id: &str, task: &str, archive: &[u8]) -> Result<Self, WorkspaceError> {
        let dir = std::env::temp_dir()
            .join("sloth-agent")
            .join(format!("{run_id}-{task}-{}", std::process::id()));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        if !archive.is_empty() {
            match sniff_archive_kind(archive) {
                ArchiveKind::Tar => tar::Archive::new(archive).unpack(&dir)?,
                ArchiveKind::TarGz => {
                    tar::Archive::new(GzDecoder::new(archive)).unpack(&dir)?
                }
            }
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pack the declared artifacts (glob patterns allowed) into a tar
    /// blob. Missing artifacts are logged, not fatal; only what exists at
    /// completion travels back.
    pub fn collect_artifacts(&self, patterns: &[String]) -> Result<Vec<u8>, WorkspaceError> {
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = tar::Builder::new(Vec::new());
        builder.follow_symlinks(false);
        let mut found_any = false;

        for pattern in patterns {
            let full = self.dir.join(pattern).to_string_lossy().into_owned();
            let Ok(matches) = glob::glob(&full) else {
                warn!(pattern = %pattern, "bad artifact pattern");
                continue;
            };
            let mut matched = false;
            for entry in matches.flatten() {
                matched = true;
                found_any = true;
                let rel = entry.strip_prefix(&self.dir).unwrap_or(&entry).to_path_buf();
                if entry.is_dir() {
                    builder.append_dir_all(&rel, &entry)?;
                } else {
                    builder.append_path_with_name(&entry, &rel)?;
                }
            }
            if !matched {
                warn!(pattern = %pattern, "declared artifact produced no files");
            }
        }

        if !found_any {
            return Ok(Vec::new());
        }
        Ok(builder.into_inner()?)
    }
}

impl Drop for TaskWorkspace {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
