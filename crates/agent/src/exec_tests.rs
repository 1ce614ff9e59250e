// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sloth_core::Task;
use sloth_wire::{read_archive, read_message};

async fn read_frames_until_final<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
) -> Vec<ExecFrame> {
    let mut frames = Vec::new();
    loop {
        let bytes = read_message(reader).await.unwrap();
        let frame: ExecFrame = sloth_wire::decode(&bytes).unwrap();
        let done = frame.is_final();
        frames.push(frame);
        if done {
            return frames;
        }
    }
}

fn envelope_for(command: &str, artifacts: &[&str]) -> TaskEnvelope {
    let mut task = Task::shell("remote", command);
    task.artifacts = artifacts.iter().map(|a| a.to_string()).collect();
    TaskEnvelope { task, dep_outputs: BTreeMap::new() }
}

fn context() -> WorkflowContext {
    WorkflowContext {
        run_id: format!("run-{}", std::process::id()),
        workflow: "wf".to_string(),
        stack: "prod".to_string(),
        params: BTreeMap::new(),
    }
}

#[tokio::test]
async fn run_command_streams_output_then_exit() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();

    let handler = tokio::spawn(async move {
        handle_run_command(
            "echo out; echo err 1>&2; exit 4",
            &BTreeMap::new(),
            None,
            Some(Duration::from_secs(5)),
            &mut near,
            &cancel,
        )
        .await
        .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();

    assert!(frames.contains(&ExecFrame::Stdout { data: "out".to_string() }));
    assert!(frames.contains(&ExecFrame::Stderr { data: "err".to_string() }));
    assert_eq!(frames.last(), Some(&ExecFrame::Exit { code: 4, error: None }));
}

#[tokio::test]
async fn run_command_deadline_yields_timeout_error_frame() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();

    let handler = tokio::spawn(async move {
        handle_run_command(
            "sleep 5",
            &BTreeMap::new(),
            None,
            Some(Duration::from_millis(100)),
            &mut near,
            &cancel,
        )
        .await
        .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    assert!(matches!(
        frames.last(),
        Some(ExecFrame::Error { kind: ExecErrorKind::Timeout, .. })
    ));
}

#[tokio::test]
async fn execute_task_success_returns_result_and_artifacts() {
    let (mut near, mut far) = tokio::io::duplex(256 * 1024);
    let cancel = CancellationToken::new();
    let envelope = envelope_for("mkdir -p dist && echo built > dist/app", &["dist/app"]);

    let handler = tokio::spawn(async move {
        handle_execute_task(envelope, context(), Vec::new(), &mut near, &cancel)
            .await
            .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    assert_eq!(frames.first(), Some(&ExecFrame::Started));
    let Some(ExecFrame::TaskResult { success, artifacts, .. }) = frames.last() else {
        panic!("expected TaskResult, got {:?}", frames.last());
    };
    assert!(*success);
    assert!(!artifacts.is_empty());

    // The artifact archive follows the result frame as raw chunks.
    let blob = read_archive(&mut far, artifacts).await.unwrap();
    handler.await.unwrap();
    let out = tempfile::tempdir().unwrap();
    tar::Archive::new(blob.as_slice()).unpack(out.path()).unwrap();
    assert_eq!(std::fs::read_to_string(out.path().join("dist/app")).unwrap().trim(), "built");
}

#[tokio::test]
async fn execute_task_failure_is_an_unsuccessful_result_not_an_error() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();
    let envelope = envelope_for("exit 9", &[]);

    let handler = tokio::spawn(async move {
        handle_execute_task(envelope, context(), Vec::new(), &mut near, &cancel)
            .await
            .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    let Some(ExecFrame::TaskResult { success, message, .. }) = frames.last() else {
        panic!("expected TaskResult");
    };
    assert!(!*success);
    assert!(message.contains('9'));
}

#[tokio::test]
async fn execute_task_sees_the_shipped_workspace() {
    let src = tempfile::tempdir().unwrap();
    std::fs::write(src.path().join("input.txt"), b"shipped").unwrap();
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(".", src.path()).unwrap();
    let workspace = builder.into_inner().unwrap();

    let (mut near, mut far) = tokio::io::duplex(256 * 1024);
    let cancel = CancellationToken::new();
    let envelope = envelope_for("grep -q shipped input.txt", &[]);

    let handler = tokio::spawn(async move {
        handle_execute_task(envelope, context(), workspace, &mut near, &cancel)
            .await
            .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    assert!(matches!(frames.last(), Some(ExecFrame::TaskResult { success: true, .. })));
}

#[tokio::test]
async fn script_task_without_runtime_is_unsupported() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();
    let mut task = Task::shell("scripted", "unused");
    task.command = sloth_core::Command::Script(sloth_core::ScriptHandle::new("fn"));
    let envelope = TaskEnvelope { task, dep_outputs: BTreeMap::new() };

    let handler = tokio::spawn(async move {
        handle_execute_task(envelope, context(), Vec::new(), &mut near, &cancel)
            .await
            .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    assert!(matches!(
        frames.last(),
        Some(ExecFrame::Error { kind: ExecErrorKind::Unsupported, .. })
    ));
}

#[tokio::test]
async fn delegation_is_cleared_even_if_sender_forgot() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();
    let mut envelope = envelope_for("true", &[]);
    envelope.task.delegate_to = sloth_core::DelegateTarget::Agent("other".to_string());

    let handler = tokio::spawn(async move {
        handle_execute_task(envelope, context(), Vec::new(), &mut near, &cancel)
            .await
            .unwrap();
    });

    // Runs locally on this agent, no recursion: a successful result.
    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    assert!(matches!(frames.last(), Some(ExecFrame::TaskResult { success: true, .. })));
}

#[tokio::test]
async fn cancellation_terminates_the_subprocess() {
    let (mut near, mut far) = tokio::io::duplex(64 * 1024);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let handler = tokio::spawn(async move {
        handle_run_command(
            "sleep 30",
            &BTreeMap::new(),
            None,
            None,
            &mut near,
            &cancel,
        )
        .await
        .unwrap();
    });

    let frames = read_frames_until_final(&mut far).await;
    handler.await.unwrap();
    assert!(matches!(
        frames.last(),
        Some(ExecFrame::Error { kind: ExecErrorKind::Cancelled, .. })
    ));
    assert!(started.elapsed() < Duration::from_secs(15));
}
