// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent runtime assembly.

use crate::client::MasterClient;
use crate::config::AgentConfig;
use crate::listener::ExecListener;
use crate::supervisor::Supervisor;
use sloth_core::retry::SHUTDOWN_GRACE;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid bind address: {0}")]
    BindAddress(#[from] std::net::AddrParseError),

    #[error("failed to bind execution listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// The long-running agent process.
///
/// Wires the execution listener and the connection supervisor to one
/// shutdown token: a `Shutdown` RPC or a local signal stops both, with
/// the grace period for in-flight work.
pub struct AgentRuntime {
    config: AgentConfig,
}

impl AgentRuntime {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run until the shutdown token fires (signal) or a `Shutdown` RPC
    /// arrives.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AgentError> {
        let bind_addr = self.config.bind_addr()?;
        let listener = TcpListener::bind(bind_addr).await?;
        info!(
            agent = %self.config.name,
            listen = %bind_addr,
            advertised = %self.config.advertised_address(),
            master = %self.config.master_addr,
            "agent starting"
        );

        let exec = ExecListener::new(listener, shutdown.clone());
        let listener_task = tokio::spawn(exec.run(SHUTDOWN_GRACE));

        let client = MasterClient::new(&self.config.master_addr);
        let mut supervisor =
            Supervisor::new(client, self.config.name.clone(), self.config.advertised_address());
        supervisor.run(shutdown.clone()).await;

        // Supervisor only returns on shutdown; wait for the listener to
        // drain its in-flight work.
        let _ = listener_task.await;
        info!(agent = %self.config.name, "agent stopped");
        Ok(())
    }
}
