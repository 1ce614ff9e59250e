// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution-service listener.
//!
//! Accepts connections and spawns a handler per connection, so one long
//! task never blocks another (or the heartbeat loop). After the request
//! and its payload are read, the read half becomes a disconnect watch:
//! EOF from the caller cancels the work.

use crate::exec;
use sloth_wire::{
    read_archive, read_frame, write_frame, ExecFrame, ExecRequest, ProtocolError,
    DEFAULT_IPC_TIMEOUT,
};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

/// Listener for incoming execution requests.
pub(crate) struct ExecListener {
    listener: TcpListener,
    /// Fires when the agent shuts down; handlers watch a child of it.
    shutdown: CancellationToken,
    /// Tracks in-flight handlers for drain-on-shutdown.
    tracker: TaskTracker,
}

impl ExecListener {
    pub fn new(listener: TcpListener, shutdown: CancellationToken) -> Self {
        Self { listener, shutdown, tracker: TaskTracker::new() }
    }

    /// Accept until shutdown, then give in-flight handlers the grace
    /// period to drain.
    pub async fn run(self, grace: Duration) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "execution connection");
                        let shutdown = self.shutdown.clone();
                        self.tracker.spawn(async move {
                            if let Err(e) = handle_connection(stream, shutdown).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("accept error: {}", e),
                },
                _ = self.shutdown.cancelled() => break,
            }
        }

        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            info!("grace period elapsed with work still in flight");
        }
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("caller disconnected"),
        ProtocolError::Timeout => debug!("connection timeout"),
        other => error!("connection error: {}", other),
    }
}

async fn handle_connection(
    stream: TcpStream,
    shutdown: CancellationToken,
) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    let request: ExecRequest = read_frame(&mut reader, DEFAULT_IPC_TIMEOUT).await?;

    // Cancellation: shutdown, or the caller closing its end.
    let cancel = shutdown.child_token();

    match request {
        ExecRequest::Ping => {
            write_frame(&mut writer, &ExecFrame::Ok, DEFAULT_IPC_TIMEOUT).await
        }

        ExecRequest::Shutdown { reason } => {
            info!(%reason, "shutdown requested");
            write_frame(&mut writer, &ExecFrame::Ok, DEFAULT_IPC_TIMEOUT).await?;
            shutdown.cancel();
            Ok(())
        }

        ExecRequest::UpdateAgent { target_version } => {
            // Binary replacement is the deployment pipeline's job; the
            // agent reports whether a restart would be needed to get there.
            let current = env!("CARGO_PKG_VERSION");
            let restart_required = target_version != current;
            info!(%target_version, current, restart_required, "update requested");
            write_frame(
                &mut writer,
                &ExecFrame::UpdateResult { ok: true, restart_required },
                DEFAULT_IPC_TIMEOUT,
            )
            .await
        }

        ExecRequest::RunCommand { command, env, workdir, timeout_ms } => {
            watch_for_disconnect(reader, cancel.clone());
            exec::handle_run_command(
                &command,
                &env,
                workdir.as_deref(),
                timeout_ms.map(Duration::from_millis),
                &mut writer,
                &cancel,
            )
            .await
        }

        ExecRequest::ExecuteTask { task, context, workspace } => {
            let workspace_bytes = read_archive(&mut reader, &workspace).await?;
            watch_for_disconnect(reader, cancel.clone());
            exec::handle_execute_task(task, context, workspace_bytes, &mut writer, &cancel)
                .await
        }
    }
}

/// In this protocol the caller sends nothing after the request; a read
/// completing means EOF (or noise), either way the caller is gone.
fn watch_for_disconnect(
    mut reader: tokio::net::tcp::OwnedReadHalf,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let mut buf = [0u8; 1];
        let _ = reader.read(&mut buf).await;
        cancel.cancel();
    });
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
