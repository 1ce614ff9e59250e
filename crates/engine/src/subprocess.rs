// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers.
//!
//! Commands run through `sh -c` with captured output. The streaming
//! variant reports stdout/stderr lines as they arrive, preserving each
//! stream's internal order, and honours cancellation and deadlines.

use crate::error::TaskError;
use crate::logger::TaskLogger;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Deadline for predicate and hook commands, which should be quick.
pub const SHELL_HOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Captured result of a finished shell command.
#[derive(Debug, Clone)]
pub struct ShellOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run a shell command to completion with a timeout, capturing output.
///
/// Used for predicates and hooks; task commands go through
/// [`run_shell_streaming`] so their output reaches the log sink live.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<ShellOutput, TaskError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).current_dir(cwd).envs(env).kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| TaskError::Timeout(timeout))?
        .map_err(|e| TaskError::Execution(format!("failed to spawn {command:?}: {e}")))?;

    Ok(ShellOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Run a shell command, streaming its output into the logger.
///
/// Returns the exit code. Cancellation and deadline both kill the child
/// (`kill_on_drop`); the caller maps them to the right error kind.
pub async fn run_shell_streaming(
    command: &str,
    cwd: &Path,
    env: &BTreeMap<String, String>,
    timeout: Option<Duration>,
    cancel: &CancellationToken,
    logger: &TaskLogger,
) -> Result<i32, TaskError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| TaskError::Execution(format!("failed to spawn {command:?}: {e}")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let out_logger = logger.clone();
    let stdout_task = tokio::spawn(async move {
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                out_logger.stdout(&line);
            }
        }
    });
    let err_logger = logger.clone();
    let stderr_task = tokio::spawn(async move {
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                err_logger.stderr(&line);
            }
        }
    });

    let wait = async {
        let status = child
            .wait()
            .await
            .map_err(|e| TaskError::Execution(format!("wait failed: {e}")))?;
        // Drain the readers so trailing output is not lost.
        let _ = stdout_task.await;
        let _ = stderr_task.await;
        Ok::<i32, TaskError>(status.code().unwrap_or(-1))
    };

    match timeout {
        Some(deadline) => tokio::select! {
            result = wait => result,
            _ = tokio::time::sleep(deadline) => Err(TaskError::Timeout(deadline)),
            _ = cancel.cancelled() => Err(TaskError::Cancelled("task cancelled".to_string())),
        },
        None => tokio::select! {
            result = wait => result,
            _ = cancel.cancelled() => Err(TaskError::Cancelled("task cancelled".to_string())),
        },
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
