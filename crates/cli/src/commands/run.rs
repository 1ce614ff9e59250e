// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `sloth run` - execute a workflow against a stack.

use crate::client::{expect_ok, MasterClient};
use crate::commands::{confirm, parse_key_value};
use crate::exit_error::ExitError;
use crate::output::{render_report, OutputFormat};
use sloth_wire::{Request, Response};
use sloth_workflow::{parse_workflow_with_format, Format};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Response wait: the workflow-level timeout plus slack, or a day for
/// unbounded workflows.
const UNBOUNDED_RUN_TIMEOUT: Duration = Duration::from_secs(24 * 3600);
const RUN_TIMEOUT_SLACK: Duration = Duration::from_secs(60);

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Stack to run against (created on first use)
    pub stack: String,

    /// Workflow definition file (.hcl, .toml, or .json)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Workflow name, when the file defines more than one
    #[arg(long)]
    pub workflow: Option<String>,

    /// Run parameters (can be repeated: --param key=value)
    #[arg(long = "param", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Steal an expired stack lock
    #[arg(long)]
    pub force: bool,
}

pub async fn handle(
    args: RunArgs,
    client: &MasterClient,
    output: OutputFormat,
) -> Result<(), ExitError> {
    let source = std::fs::read_to_string(&args.file)
        .map_err(|e| ExitError::usage(format!("cannot read {}: {e}", args.file.display())))?;

    let extension = args.file.extension().and_then(|e| e.to_str()).unwrap_or("");
    let Some(format) = Format::from_extension(extension) else {
        return Err(ExitError::usage(format!(
            "unknown workflow format {extension:?} (expected hcl, toml, or json)"
        )));
    };

    let params: BTreeMap<String, String> = args.params.into_iter().collect();

    // Validate locally before bothering the master (and before the
    // confirmation prompt, so a typo fails fast).
    let file = parse_workflow_with_format(&source, format)
        .map_err(|e| ExitError::usage(e.to_string()))?;
    let (name, def) = file
        .select(args.workflow.as_deref())
        .map_err(|e| ExitError::usage(e.to_string()))?;
    let group = def.to_group(name, &params).map_err(|e| ExitError::usage(e.to_string()))?;

    confirm(
        &format!("Run workflow {:?} ({} tasks) against stack {:?}?", name, group.tasks.len(), args.stack),
        args.yes || output.is_json(),
    )?;

    let timeout = group
        .config
        .timeout_ms
        .map(|ms| Duration::from_millis(ms) + RUN_TIMEOUT_SLACK)
        .unwrap_or(UNBOUNDED_RUN_TIMEOUT);

    let base_dir = std::env::current_dir()
        .map_err(|e| ExitError::failure(format!("cannot resolve working directory: {e}")))?;

    let request = Request::RunWorkflow {
        stack: args.stack,
        source,
        format: format.as_str().to_string(),
        workflow: args.workflow,
        params,
        base_dir,
        force: args.force,
    };

    match expect_ok(client.send(request, timeout).await?)? {
        Response::Run { report } => {
            let code = render_report(&report, output);
            if code == 0 {
                Ok(())
            } else {
                // The report already told the story; exit quietly.
                Err(ExitError::new(code, String::new()))
            }
        }
        other => Err(ExitError::failure(format!("unexpected response: {other:?}"))),
    }
}
