// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! sloth - Sloth Runner CLI

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod color;
mod commands;
mod exit_error;
mod master_process;
mod output;

use clap::{Parser, Subcommand};
use client::MasterClient;
use commands::{agent, master, run, stack, state};
use output::OutputFormat;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

#[derive(Parser)]
#[command(
    name = "sloth",
    version = VERSION,
    about = "Sloth Runner - distributed task execution"
)]
struct Cli {
    /// Master address (host:port); defaults to SLOTH_MASTER_ADDR
    #[arg(long, global = true, value_name = "ADDR")]
    master: Option<String>,

    /// Output format
    #[arg(short = 'o', long = "output", value_enum, default_value_t, global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow against a named stack
    Run(run::RunArgs),
    /// Agent management
    Agent(agent::AgentArgs),
    /// Workflow state management
    State(state::StateArgs),
    /// Stack administration
    Stack(stack::StackArgs),
    /// Master daemon lifecycle
    Master(master::MasterArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = MasterClient::new(cli.master.clone());
    let output = cli.output;

    let result = match cli.command {
        Commands::Run(args) => run::handle(args, &client, output).await,
        Commands::Agent(args) => agent::handle(args, &client, output).await,
        Commands::State(args) => state::handle(args, &client, output).await,
        Commands::Stack(args) => stack::handle(args, &client, output).await,
        Commands::Master(args) => master::handle(args, &client, output).await,
    };

    if let Err(e) = result {
        if !e.message.is_empty() {
            if output.is_json() {
                println!("{}", serde_json::json!({ "error": e.message, "code": e.code }));
            } else {
                eprintln!("error: {e}");
            }
        }
        std::process::exit(e.code);
    }
}
