// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sloth state workflow` - workflow state management.

use crate::client::{expect_ok, MasterClient};
use crate::commands::confirm;
use crate::exit_error::ExitError;
use crate::output::{render_drift, render_stack, render_stacks, render_versions, OutputFormat};
use sloth_core::ObservedResource;
use sloth_wire::{Request, Response, DEFAULT_IPC_TIMEOUT};
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum StateCommand {
    /// Workflow state operations
    Workflow(WorkflowArgs),
}

#[derive(clap::Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum WorkflowCommand {
    /// List all stacks
    List,

    /// Show one stack (name or ID prefix)
    Show { stack: String },

    /// List a stack's version history
    Versions { stack: String },

    /// Roll a stack back to a version
    Rollback {
        stack: String,
        version: u64,
        /// Steal an expired lock
        #[arg(long)]
        force: bool,
    },

    /// Diff recorded resources against observed attributes
    Drift {
        stack: String,
        /// JSON file with the observed resources
        #[arg(long)]
        observed: PathBuf,
    },

    /// Delete a stack and everything it owns
    Delete {
        stack: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub async fn handle(
    args: StateArgs,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    let StateCommand::Workflow(workflow) = args.command;
    handle_workflow(workflow.command, client, output).await
}

pub async fn handle_workflow(
    command: WorkflowCommand,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    match command {
        WorkflowCommand::List => {
            let response =
                expect_ok(client.send(Request::StackList, DEFAULT_IPC_TIMEOUT).await?)?;
            let Response::Stacks { stacks } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_stacks(&stacks, output);
            Ok(())
        }

        WorkflowCommand::Show { stack } => {
            let response =
                expect_ok(client.send(Request::StackShow { stack }, DEFAULT_IPC_TIMEOUT).await?)?;
            let Response::Stack { stack } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_stack(&stack.stack, output);
            Ok(())
        }

        WorkflowCommand::Versions { stack } => {
            let response = expect_ok(
                client.send(Request::StateVersions { stack }, DEFAULT_IPC_TIMEOUT).await?,
            )?;
            let Response::Versions { versions } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_versions(&versions, output);
            Ok(())
        }

        WorkflowCommand::Rollback { stack, version, force } => {
            let response = expect_ok(
                client
                    .send(Request::StateRollback { stack, version, force }, DEFAULT_IPC_TIMEOUT)
                    .await?,
            )?;
            let Response::Stack { stack } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            println!("rolled back to the contents of version {version}");
            render_stack(&stack.stack, output);
            Ok(())
        }

        WorkflowCommand::Drift { stack, observed } => {
            let raw = std::fs::read_to_string(&observed).map_err(|e| {
                ExitError::usage(format!("cannot read {}: {e}", observed.display()))
            })?;
            let observed: Vec<ObservedResource> = serde_json::from_str(&raw)
                .map_err(|e| ExitError::usage(format!("bad observed resources: {e}")))?;

            let response = expect_ok(
                client
                    .send(Request::StateDrift { stack, observed }, DEFAULT_IPC_TIMEOUT)
                    .await?,
            )?;
            let Response::Drift { report } = response else {
                return Err(ExitError::failure("unexpected response"));
            };
            render_drift(&report, output);
            Ok(())
        }

        WorkflowCommand::Delete { stack, yes } => {
            confirm(&format!("Delete stack {stack:?} and all its state?"), yes)?;
            expect_ok(client.send(Request::StackDelete { stack }, DEFAULT_IPC_TIMEOUT).await?)?;
            println!("deleted");
            Ok(())
        }
    }
}
