// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sloth stack` - stack administration.
//!
//! Thin aliases over the state-workflow operations; stacks are the
//! user-facing name for persisted workflow state.

use crate::client::MasterClient;
use crate::commands::state::{handle_workflow, WorkflowCommand};
use crate::exit_error::ExitError;
use crate::output::OutputFormat;

#[derive(clap::Args, Debug)]
pub struct StackArgs {
    #[command(subcommand)]
    pub command: StackCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum StackCommand {
    /// List all stacks
    List,

    /// Show one stack (name or ID prefix)
    Show { stack: String },

    /// Delete a stack and everything it owns
    Delete {
        stack: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub async fn handle(
    args: StackArgs,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    let command = match args.command {
        StackCommand::List => WorkflowCommand::List,
        StackCommand::Show { stack } => WorkflowCommand::Show { stack },
        StackCommand::Delete { stack, yes } => WorkflowCommand::Delete { stack, yes },
    };
    handle_workflow(command, client, output).await
}
