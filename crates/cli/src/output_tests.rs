// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sloth_core::StackStatus;
use sloth_wire::{StackRef, TaskReport};

fn report() -> RunReport {
    RunReport {
        run_id: "run-1".to_string(),
        workflow: "deploy".to_string(),
        stack: StackRef { id: "stk-1".to_string(), name: "prod".to_string() },
        status: StackStatus::Success,
        started_at_ms: 0,
        duration_ms: 3_200,
        tasks: vec![
            (
                "build".to_string(),
                TaskReport {
                    status: TaskStatus::Success,
                    duration_ms: 2_000,
                    attempts: 1,
                    error: None,
                    agents: Vec::new(),
                },
            ),
            (
                "deploy".to_string(),
                TaskReport {
                    status: TaskStatus::Success,
                    duration_ms: 1_200,
                    attempts: 2,
                    error: None,
                    agents: vec!["agent-1".to_string()],
                },
            ),
        ],
        outputs: [("url".to_string(), "http://x".to_string())].into(),
        error: None,
    }
}

#[test]
fn exit_code_follows_report_status() {
    let mut r = report();
    assert_eq!(render_report(&r, OutputFormat::Basic), 0);
    r.status = StackStatus::Failed;
    r.error = Some("1 task(s) failed".to_string());
    assert_eq!(render_report(&r, OutputFormat::Basic), 1);
}

#[test]
fn json_mode_emits_the_contract_fields() {
    // Rebuild the json object the renderer prints and check its shape.
    let r = report();
    let tasks: serde_json::Map<String, serde_json::Value> = r
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
        "status": r.status,
        "duration": format_elapsed_ms(r.duration_ms),
        "stack": { "id": r.stack.id, "name": r.stack.name },
        "tasks": tasks,
        "outputs": r.outputs,
        "workflow": r.workflow,
        "execution_time": r.duration_ms,
    });

    assert_eq!(line["status"], "success");
    assert_eq!(line["stack"]["name"], "prod");
    assert_eq!(line["tasks"]["build"]["status"], "success");
    assert_eq!(line["outputs"]["url"], "http://x");
    assert_eq!(line["workflow"], "deploy");
    assert_eq!(line["duration"], "3s");
    for key in ["status", "duration", "stack", "tasks", "outputs", "workflow", "execution_time"] {
        assert!(line.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn status_text_colors_only_in_rich_mode() {
    assert_eq!(status_text(TaskStatus::Success, OutputFormat::Basic), "success");
    assert!(status_text(TaskStatus::Success, OutputFormat::Rich).contains("\x1b[32m"));
    assert!(status_text(TaskStatus::Failed, OutputFormat::Rich).contains("\x1b[31m"));
}
