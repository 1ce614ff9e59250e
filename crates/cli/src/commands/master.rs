// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sloth master` - master daemon lifecycle.

use crate::client::{expect_ok, MasterClient};
use crate::exit_error::ExitError;
use crate::master_process;
use crate::output::{render_status, OutputFormat};
use sloth_wire::{Request, Response, DEFAULT_IPC_TIMEOUT};

#[derive(clap::Args, Debug)]
pub struct MasterArgs {
    #[command(subcommand)]
    pub command: MasterCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum MasterCommand {
    /// Start the local master daemon
    Start,
    /// Stop the master daemon
    Stop,
    /// Show master status
    Status,
}

pub async fn handle(
    args: MasterArgs,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    match args.command {
        MasterCommand::Start => {
            // Already running? Then starting is a no-op.
            if client.send(Request::Ping, DEFAULT_IPC_TIMEOUT).await.is_ok() {
                println!("master is already running at {}", client.address());
                return Ok(());
            }
            if master_process::try_start()? {
                println!("master started");
                Ok(())
            } else {
                Err(ExitError::failure("slothd binary not found"))
            }
        }

        MasterCommand::Stop => {
            let response =
                expect_ok(client.send(Request::Shutdown, DEFAULT_IPC_TIMEOUT).await?)?;
            match response {
                Response::ShuttingDown => {
                    println!("master shutting down");
                    Ok(())
                }
                other => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
            }
        }

        MasterCommand::Status => {
            let response = expect_ok(client.send(Request::Status, DEFAULT_IPC_TIMEOUT).await?)?;
            let Response::Status { status } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_status(&status, output);
            Ok(())
        }
    }
}
