// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task and command execution on the agent.
//!
//! Each handler owns one subprocess and streams its output as frames on
//! the caller's connection. Cancellation (caller gone, shutdown) sends
//! SIGTERM, waits out the grace period, then SIGKILLs.

use crate::workspace::TaskWorkspace;
use sloth_core::retry::SHUTDOWN_GRACE;
use sloth_core::Command as TaskCommand;
use sloth_wire::{
    archive_info, write_archive, write_frame, ExecErrorKind, ExecFrame, ProtocolError,
    TaskEnvelope, WorkflowContext, DEFAULT_IPC_TIMEOUT,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Why a streamed subprocess ended without an exit status.
enum StreamEnd {
    Exited(i32),
    TimedOut,
    Cancelled,
    /// Spawn failed; the error frame is already on the wire.
    SpawnFailed,
}

/// Run a one-shot command, streaming output frames. Writes the final
/// frame (`Exit` or `Error`) before returning.
pub(crate) async fn handle_run_command<W>(
    command: &str,
    env: &BTreeMap<String, String>,
    workdir: Option<&Path>,
    timeout: Option<Duration>,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    info!(%command, "running remote command");
    let cwd = workdir.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir);
    match stream_subprocess(command, env, &cwd, timeout, writer, cancel).await? {
        StreamEnd::SpawnFailed => Ok(()),
        StreamEnd::Exited(code) => {
            write_frame(writer, &ExecFrame::Exit { code, error: None }, DEFAULT_IPC_TIMEOUT)
                .await
        }
        StreamEnd::TimedOut => {
            write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Timeout,
                    message: "command deadline exceeded".to_string(),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }
        StreamEnd::Cancelled => {
            // Caller likely gone; the write is best-effort.
            write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Cancelled,
                    message: "command cancelled".to_string(),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }
    }
}

/// Execute a shipped task in a private workspace. Writes the final frame
/// (`TaskResult` plus artifact chunks, or `Error`) before returning.
pub(crate) async fn handle_execute_task<W>(
    envelope: TaskEnvelope,
    context: WorkflowContext,
    workspace_bytes: Vec<u8>,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut task = envelope.task;
    // Invariant: a task arriving at an agent runs here. A populated
    // delegate_to would recurse, so it is cleared regardless of sender.
    task.delegate_to.clear();

    info!(task = %task.name, run = %context.run_id, "executing delegated task");

    let command = match &task.command {
        TaskCommand::Shell(command) => command.clone(),
        TaskCommand::Script(handle) => {
            return write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Unsupported,
                    message: format!(
                        "script handle {handle:?} needs a script runtime; this agent has none"
                    ),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await;
        }
    };

    let workspace = match TaskWorkspace::unpack(&context.run_id, &task.name, &workspace_bytes) {
        Ok(ws) => ws,
        Err(e) => {
            return write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Internal,
                    message: format!("workspace unpack failed: {e}"),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await;
        }
    };

    write_frame(writer, &ExecFrame::Started, DEFAULT_IPC_TIMEOUT).await?;

    let timeout = task.timeout_ms.map(Duration::from_millis);
    let end =
        stream_subprocess(&command, &task.env, workspace.dir(), timeout, writer, cancel).await?;

    match end {
        StreamEnd::SpawnFailed => Ok(()),
        StreamEnd::Exited(0) => {
            let artifacts = match workspace.collect_artifacts(&task.artifacts) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(task = %task.name, error = %e, "artifact collection failed");
                    Vec::new()
                }
            };
            write_frame(
                writer,
                &ExecFrame::TaskResult {
                    success: true,
                    message: String::new(),
                    outputs: BTreeMap::new(),
                    artifacts: archive_info(&artifacts),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await?;
            write_archive(writer, &artifacts).await
        }
        StreamEnd::Exited(code) => {
            // Application failure, not a transport error: the caller's
            // retry policy decides what happens next.
            write_frame(
                writer,
                &ExecFrame::TaskResult {
                    success: false,
                    message: format!("command exited with code {code}"),
                    outputs: BTreeMap::new(),
                    artifacts: archive_info(&[]),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }
        StreamEnd::TimedOut => {
            write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Timeout,
                    message: "task deadline exceeded".to_string(),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }
        StreamEnd::Cancelled => {
            write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Cancelled,
                    message: "task cancelled".to_string(),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }
    }
}

/// Spawn `sh -c <command>` and stream its output as frames, preserving
/// each stream's order. Returns how the subprocess ended; the caller
/// writes the final frame.
async fn stream_subprocess<W>(
    command: &str,
    env: &BTreeMap<String, String>,
    cwd: &Path,
    timeout: Option<Duration>,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<StreamEnd, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            write_frame(
                writer,
                &ExecFrame::Error {
                    kind: ExecErrorKind::Execution,
                    message: format!("failed to spawn: {e}"),
                },
                DEFAULT_IPC_TIMEOUT,
            )
            .await?;
            return Ok(StreamEnd::SpawnFailed);
        }
    };

    let (tx, mut rx) = mpsc::channel::<ExecFrame>(64);
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(ExecFrame::Stdout { data: line }).await.is_err() {
                    break;
                }
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tx.send(ExecFrame::Stderr { data: line }).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    let end;
    loop {
        let deadline_sleep = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(frame) => write_frame(writer, &frame, DEFAULT_IPC_TIMEOUT).await?,
                // Output streams closed; wait for the exit status.
                None => {
                    let code = child.wait().await.map(|s| s.code().unwrap_or(-1)).unwrap_or(-1);
                    end = StreamEnd::Exited(code);
                    break;
                }
            },
            _ = deadline_sleep => {
                terminate(&mut child).await;
                end = StreamEnd::TimedOut;
                break;
            }
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                end = StreamEnd::Cancelled;
                break;
            }
        }
    }

    // Drain whatever the readers still hold so trailing output frames
    // are not lost (best-effort after termination).
    while let Some(frame) = rx.recv().await {
        write_frame(writer, &frame, DEFAULT_IPC_TIMEOUT).await?;
    }

    Ok(end)
}

/// SIGTERM, grace period, then SIGKILL.
async fn terminate(child: &mut Child) {
    if let Some(id) = child.id() {
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(id as i32),
            nix::sys::signal::Signal::SIGTERM,
        );
        if tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await.is_ok() {
            return;
        }
    }
    let _ = child.kill().await;
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
