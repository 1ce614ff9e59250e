// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Output rendering.
//!
//! Four modes: `basic` (plain lines), `enhanced` (more detail),
//! `rich` (colors), and `json`. In json mode the final line on stdout is
//! exactly one JSON object.

use crate::color;
use sloth_core::time_fmt::format_elapsed_ms;
use sloth_core::{DriftReport, StackState, TaskStatus};
use sloth_wire::{AgentInfo, MasterStatus, RunReport, StackSummary, VersionSummary};

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Basic,
    Enhanced,
    Rich,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

fn status_text(status: TaskStatus, format: OutputFormat) -> String {
    let text = status.to_string();
    if format != OutputFormat::Rich {
        return text;
    }
    match status {
        TaskStatus::Success => color::green(&text),
        TaskStatus::Failed => color::red(&text),
        TaskStatus::Skipped => color::yellow(&text),
        _ => text,
    }
}

/// Render a run report. Returns the process exit code.
pub fn render_report(report: &RunReport, format: OutputFormat) -> i32 {
    if format.is_json() {
        let tasks: serde_json::Map<String, serde_json::Value> = report
            .tasks
            .iter()
            .map(|(name, task)| {
                (
                    name.clone(),
                    serde_json::json!({
                        "status": task.status,
                        "duration": format_elapsed_ms(task.duration_ms),
                        "error": task.error,
                    }),
                )
            })
            .collect();

        let line = serde_json::json!({
            "status": report.status,
            "duration": format_elapsed_ms(report.duration_ms),
            "stack": { "id": report.stack.id, "name": report.stack.name },
            "tasks": tasks,
            "outputs": report.outputs,
            "workflow": report.workflow,
            "execution_time": report.duration_ms,
        });
        println!("{line}");
        return if report.success() { 0 } else { 1 };
    }

    let header = format!(
        "workflow {} on stack {} ({})",
        report.workflow,
        report.stack.name,
        format_elapsed_ms(report.duration_ms)
    );
    match format {
        OutputFormat::Rich => println!("{}", color::bold(&header)),
        _ => println!("{header}"),
    }

    for (name, task) in &report.tasks {
        let status = status_text(task.status, format);
        match format {
            OutputFormat::Basic => println!("  {name}: {status}"),
            _ => {
                let mut line = format!(
                    "  {name}: {status} ({})",
                    format_elapsed_ms(task.duration_ms)
                );
                if task.attempts > 1 {
                    line.push_str(&format!(" after {} attempts", task.attempts));
                }
                if !task.agents.is_empty() {
                    line.push_str(&format!(" on {}", task.agents.join(", ")));
                }
                println!("{line}");
            }
        }
        if let Some(error) = &task.error {
            let text = format!("      {error}");
            match format {
                OutputFormat::Rich => println!("{}", color::red(&text)),
                _ => println!("{text}"),
            }
        }
    }

    if !report.outputs.is_empty() {
        println!("outputs:");
        for (key, value) in &report.outputs {
            println!("  {key} = {value}");
        }
    }

    if report.success() {
        println!("status: success");
        0
    } else {
        let line = format!(
            "status: failed{}",
            report.error.as_deref().map(|e| format!(" ({e})")).unwrap_or_default()
        );
        match format {
            OutputFormat::Rich => println!("{}", color::red(&line)),
            _ => println!("{line}"),
        }
        1
    }
}

pub fn render_agents(agents: &[AgentInfo], format: OutputFormat, now_ms: u64) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "agents": agents }));
        return;
    }
    if agents.is_empty() {
        println!("no agents registered");
        return;
    }
    for agent in agents {
        let age = format_elapsed_ms(now_ms.saturating_sub(agent.last_heartbeat_ms));
        println!(
            "{:<20} {:<22} {:<10} heartbeat {} ago  v{}",
            agent.name, agent.address, agent.status, age, agent.version
        );
    }
}

pub fn render_stacks(stacks: &[StackSummary], format: OutputFormat) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "stacks": stacks }));
        return;
    }
    if stacks.is_empty() {
        println!("no stacks");
        return;
    }
    for stack in stacks {
        let lock = stack
            .locked_by
            .as_deref()
            .map(|holder| format!("  locked by {holder}"))
            .unwrap_or_default();
        println!(
            "{:<20} v{:<4} {:<12} {} resources{}",
            stack.name, stack.version, stack.status.to_string(), stack.resources, lock
        );
    }
}

pub fn render_stack(stack: &StackState, format: OutputFormat) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "stack": stack }));
        return;
    }
    println!("stack {} ({})", stack.name, stack.id);
    println!("  version: {}", stack.version);
    println!("  status:  {}", stack.status);
    if let Some(holder) = &stack.locked_by {
        println!("  locked by: {holder}");
    }
    if let Some(error) = &stack.error {
        println!("  error: {error}");
    }
    if !stack.resources.is_empty() {
        println!("  resources:");
        for resource in &stack.resources {
            println!("    {} {} ({})", resource.kind, resource.name, resource.action);
        }
    }
    if !stack.outputs.is_empty() {
        println!("  outputs:");
        for (key, value) in &stack.outputs {
            println!("    {key} = {value}");
        }
    }
    if !stack.history.is_empty() {
        println!("  history:");
        for run in &stack.history {
            println!(
                "    {} {} {}",
                run.run_id,
                run.workflow,
                run.status,
            );
        }
    }
}

pub fn render_versions(versions: &[VersionSummary], format: OutputFormat) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "versions": versions }));
        return;
    }
    if versions.is_empty() {
        println!("no versions");
        return;
    }
    for version in versions {
        println!(
            "v{:<4} {:<12} {} resources  {}",
            version.version,
            version.status.to_string(),
            version.resources,
            version.description
        );
    }
}

pub fn render_drift(report: &DriftReport, format: OutputFormat) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "drift": report }));
        return;
    }
    if report.is_clean() {
        println!("no drift detected");
        return;
    }
    for entry in &report.drifted {
        println!("{} {} drifted:", entry.kind, entry.name);
        for field in &entry.fields {
            println!("  {}: expected {} actual {}", field.key, field.expected, field.actual);
        }
    }
    for untracked in &report.untracked {
        println!("{} {} is not tracked by the stack", untracked.kind, untracked.name);
    }
}

pub fn render_status(status: &MasterStatus, format: OutputFormat) {
    if format.is_json() {
        println!("{}", serde_json::json!({ "master": status }));
        return;
    }
    println!("master {} (up {})", status.version, format_elapsed_ms(status.uptime_ms));
    println!(
        "  agents: {} active, {} inactive",
        status.agents_active, status.agents_inactive
    );
    println!("  stacks: {}", status.stacks);
    println!("  pending events: {}", status.pending_events);
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
