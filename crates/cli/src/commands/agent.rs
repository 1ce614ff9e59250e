// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sloth agent` - agent lifecycle and remote commands.

use crate::client::{expect_ok, MasterClient};
use crate::exit_error::ExitError;
use crate::output::{render_agents, OutputFormat};
use sloth_agent::{AgentConfig, AgentRuntime};
use sloth_core::{Clock, SystemClock};
use sloth_wire::{
    read_message, write_frame, ExecFrame, ExecRequest, Request, Response, DEFAULT_IPC_TIMEOUT,
};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, stderr, stdout};
use tokio_util::sync::CancellationToken;

#[derive(clap::Args, Debug)]
pub struct AgentArgs {
    #[command(subcommand)]
    pub command: AgentCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum AgentCommand {
    /// Launch an agent in the foreground
    Start {
        /// Agent name, unique per master
        #[arg(long)]
        name: String,
        /// Port for the execution listener
        #[arg(long)]
        port: u16,
        /// Bind address for the execution listener
        #[arg(long, default_value = "0.0.0.0")]
        bind_address: String,
        /// Address reported to the master (NAT / port mapping)
        #[arg(long)]
        report_address: Option<String>,
    },

    /// Enumerate registered agents
    List {
        /// Only agents with this status (active, inactive, unknown)
        #[arg(long)]
        status: Option<String>,
    },

    /// Run a one-shot command on an agent, streaming its output
    Run {
        /// Agent name
        name: String,
        /// Command line to execute
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },

    /// Ask the master to stop an agent
    Stop { name: String },

    /// Delete an agent from the registry
    Delete { name: String },
}

pub async fn handle(
    args: AgentArgs,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    match args.command {
        AgentCommand::Start { name, port, bind_address, report_address } => {
            start(client, name, port, bind_address, report_address).await
        }
        AgentCommand::List { status } => {
            let response =
                expect_ok(client.send(Request::AgentList { status }, DEFAULT_IPC_TIMEOUT).await?)?;
            let Response::Agents { agents } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_agents(&agents, output, SystemClock.epoch_ms());
            Ok(())
        }
        AgentCommand::Run { name, command } => run_remote(client, &name, command.join(" ")).await,
        AgentCommand::Stop { name } => {
            expect_ok(client.send(Request::AgentStop { name }, Duration::from_secs(30)).await?)?;
            println!("stopped");
            Ok(())
        }
        AgentCommand::Delete { name } => {
            expect_ok(client.send(Request::AgentRemove { name }, DEFAULT_IPC_TIMEOUT).await?)?;
            println!("deleted");
            Ok(())
        }
    }
}

/// Run the agent runtime in the foreground until a signal arrives.
async fn start(
    client: &MasterClient,
    name: String,
    port: u16,
    bind_address: String,
    report_address: Option<String>,
) -> Result<(), ExitError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config = AgentConfig::new(name, client.address(), port);
    config.bind_address = bind_address;
    config.report_address = report_address;

    let shutdown = CancellationToken::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        signal_shutdown.cancel();
    });

    AgentRuntime::new(config)
        .run(shutdown)
        .await
        .map_err(|e| ExitError::failure(e.to_string()))
}

/// Resolve through the master, then talk to the agent directly and
/// stream output live. Exits with the remote exit code.
async fn run_remote(
    client: &MasterClient,
    name: &str,
    command: String,
) -> Result<(), ExitError> {
    let response = expect_ok(
        client
            .send(Request::AgentResolve { name: name.to_string() }, DEFAULT_IPC_TIMEOUT)
            .await?,
    )?;
    let Response::AgentAddress { address, .. } = response else {
        return Err(ExitError::failure("unexpected response"));
    };

    let stream = tokio::net::TcpStream::connect(&address)
        .await
        .map_err(|e| ExitError::failure(format!("cannot reach agent at {address}: {e}")))?;
    let (mut reader, mut writer) = stream.into_split();

    let request = ExecRequest::RunCommand {
        command,
        env: Default::default(),
        workdir: None,
        timeout_ms: None,
    };
    write_frame(&mut writer, &request, DEFAULT_IPC_TIMEOUT)
        .await
        .map_err(|e| ExitError::failure(e.to_string()))?;

    let mut out = stdout();
    let mut err = stderr();
    loop {
        let bytes = read_message(&mut reader)
            .await
            .map_err(|e| ExitError::failure(format!("agent stream ended: {e}")))?;
        let frame: ExecFrame =
            sloth_wire::decode(&bytes).map_err(|e| ExitError::failure(e.to_string()))?;
        match frame {
            ExecFrame::Started => {}
            ExecFrame::Stdout { data } => {
                let _ = out.write_all(data.as_bytes()).await;
                let _ = out.write_all(b"\n").await;
            }
            ExecFrame::Stderr { data } => {
                let _ = err.write_all(data.as_bytes()).await;
                let _ = err.write_all(b"\n").await;
            }
            ExecFrame::Exit { code: 0, .. } => return Ok(()),
            ExecFrame::Exit { code, .. } => {
                return Err(ExitError::new(code, format!("remote command exited with {code}")))
            }
            ExecFrame::Error { message, .. } => return Err(ExitError::failure(message)),
            other => {
                return Err(ExitError::failure(format!("unexpected frame: {other:?}")))
            }
        }
    }
}
