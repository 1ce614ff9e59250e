// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::types::{TaskEnvelope, WorkflowContext};
use sloth_core::{DelegateTarget, Task};

#[yare::parameterized(
    started = { ExecFrame::Started, false },
    stdout  = { ExecFrame::Stdout { data: "x".into() }, false },
    exit    = { ExecFrame::Exit { code: 0, error: None }, true },
    ok      = { ExecFrame::Ok, true },
)]
fn final_frames(frame: ExecFrame, is_final: bool) {
    assert_eq!(frame.is_final(), is_final);
}

#[test]
fn task_result_is_final() {
    let frame = ExecFrame::TaskResult {
        success: true,
        message: String::new(),
        outputs: Default::default(),
        artifacts: crate::ArchiveInfo::empty(),
    };
    assert!(frame.is_final());
}

#[test]
fn execute_task_round_trips() {
    let mut task = Task::shell("deploy", "echo hi");
    task.delegate_to = DelegateTarget::Local;
    let request = ExecRequest::ExecuteTask {
        task: TaskEnvelope { task, dep_outputs: Default::default() },
        context: WorkflowContext {
            run_id: "run-1".to_string(),
            workflow: "deploy".to_string(),
            stack: "prod".to_string(),
            params: Default::default(),
        },
        workspace: crate::ArchiveInfo::empty(),
    };
    let bytes = serde_json::to_vec(&request).unwrap();
    let parsed: ExecRequest = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, request);
}

#[test]
fn stream_order_is_a_sequence_of_frames() {
    // Each frame is one wire message; per-stream order is the message order.
    let frames = [
        ExecFrame::Started,
        ExecFrame::Stdout { data: "a".into() },
        ExecFrame::Stderr { data: "warning".into() },
        ExecFrame::Stdout { data: "b".into() },
        ExecFrame::Exit { code: 0, error: None },
    ];
    let terminal: Vec<bool> = frames.iter().map(ExecFrame::is_final).collect();
    assert_eq!(terminal, vec![false, false, false, false, true]);
}
