// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Seams between the executors and the outside world.
//!
//! Delegation needs two collaborators: an [`AgentResolver`] turning agent
//! names into execution addresses, and an [`AgentChannel`] speaking the
//! execution protocol to one address. Both are traits so executor and
//! runner tests run against in-process fakes.

use crate::error::TaskError;
use crate::logger::TaskLogger;
use async_trait::async_trait;
use sloth_core::retry::CONNECT_TIMEOUT;
use sloth_storage::Store;
use sloth_wire::{
    archive_info, read_archive, write_archive, write_frame, ExecErrorKind, ExecFrame,
    ExecRequest, ProtocolError, TaskEnvelope, WorkflowContext, DEFAULT_IPC_TIMEOUT,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

/// Resolve an agent name to its execution address.
#[async_trait]
pub trait AgentResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String, TaskError>;
}

/// Outcome of a delegated task on one host.
#[derive(Debug, Clone)]
pub struct DelegatedResult {
    pub success: bool,
    pub message: String,
    pub outputs: BTreeMap<String, String>,
    /// Artifact archive produced on the agent (possibly empty).
    pub artifacts: Vec<u8>,
}

/// Execution-protocol client for one task dispatch.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Ship a task (with its workspace archive) to an agent, pipe output
    /// frames into the logger, and return the result.
    async fn run_task(
        &self,
        address: &str,
        envelope: TaskEnvelope,
        context: WorkflowContext,
        workspace: Vec<u8>,
        logger: &TaskLogger,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<DelegatedResult, TaskError>;
}

/// Name resolution backed by the agent registry in the store.
pub struct StoreResolver {
    store: Arc<Store>,
}

impl StoreResolver {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AgentResolver for StoreResolver {
    async fn resolve(&self, name: &str) -> Result<String, TaskError> {
        self.store.read(|state| match state.agents.get(name) {
            None => Err(TaskError::Resolution(format!("agent {name:?} not found"))),
            Some(agent) if !agent.accepts_work() => {
                Err(TaskError::Resolution(format!("agent {name:?} is inactive")))
            }
            Some(agent) => Ok(agent.address.clone()),
        })
    }
}

/// The real channel: a TCP connection per dispatch.
///
/// Closing the connection is the cancellation signal; the agent watches
/// for EOF and kills the subprocess.
#[derive(Default, Clone)]
pub struct TcpAgentChannel;

impl TcpAgentChannel {
    pub fn new() -> Self {
        Self
    }

    async fn exchange(
        stream: TcpStream,
        envelope: TaskEnvelope,
        context: WorkflowContext,
        workspace: Vec<u8>,
        logger: &TaskLogger,
    ) -> Result<DelegatedResult, TaskError> {
        let (mut reader, mut writer) = stream.into_split();

        let request = ExecRequest::ExecuteTask {
            task: envelope,
            context,
            workspace: archive_info(&workspace),
        };
        write_frame(&mut writer, &request, DEFAULT_IPC_TIMEOUT)
            .await
            .map_err(transport)?;
        write_archive(&mut writer, &workspace).await.map_err(transport)?;

        loop {
            let frame: ExecFrame = {
                let bytes = sloth_wire::read_message(&mut reader).await.map_err(transport)?;
                sloth_wire::decode(&bytes).map_err(transport)?
            };
            match frame {
                ExecFrame::Started => {}
                ExecFrame::Stdout { data } => logger.stdout(&data),
                ExecFrame::Stderr { data } => logger.stderr(&data),
                ExecFrame::TaskResult { success, message, outputs, artifacts } => {
                    let bytes =
                        read_archive(&mut reader, &artifacts).await.map_err(transport)?;
                    return Ok(DelegatedResult { success, message, outputs, artifacts: bytes });
                }
                ExecFrame::Error { kind, message } => {
                    return Err(match kind {
                        // Agent-side timeout is an execution failure here:
                        // retryable, like any other failed attempt.
                        ExecErrorKind::Timeout => {
                            TaskError::Execution(format!("agent timeout: {message}"))
                        }
                        ExecErrorKind::Cancelled => TaskError::Cancelled(message),
                        ExecErrorKind::Internal => TaskError::Internal(message),
                        ExecErrorKind::Execution | ExecErrorKind::Unsupported => {
                            TaskError::Execution(message)
                        }
                    })
                }
                ExecFrame::Exit { .. } | ExecFrame::UpdateResult { .. } | ExecFrame::Ok => {
                    return Err(TaskError::Transport(
                        "unexpected frame in task stream".to_string(),
                    ))
                }
            }
        }
    }
}

fn transport(err: ProtocolError) -> TaskError {
    TaskError::Transport(err.to_string())
}

#[async_trait]
impl AgentChannel for TcpAgentChannel {
    async fn run_task(
        &self,
        address: &str,
        envelope: TaskEnvelope,
        context: WorkflowContext,
        workspace: Vec<u8>,
        logger: &TaskLogger,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<DelegatedResult, TaskError> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(address))
            .await
            .map_err(|_| TaskError::Transport(format!("dial {address} timed out")))?
            .map_err(|e| TaskError::Transport(format!("dial {address} failed: {e}")))?;

        let exchange = Self::exchange(stream, envelope, context, workspace, logger);

        // Dropping the exchange future closes the connection, which is how
        // cancellation and deadlines reach the agent.
        match timeout {
            Some(deadline) => tokio::select! {
                result = exchange => result,
                _ = tokio::time::sleep(deadline) => Err(TaskError::Timeout(deadline)),
                _ = cancel.cancelled() => Err(TaskError::Cancelled("dispatch cancelled".to_string())),
            },
            None => tokio::select! {
                result = exchange => result,
                _ = cancel.cancelled() => Err(TaskError::Cancelled("dispatch cancelled".to_string())),
            },
        }
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
