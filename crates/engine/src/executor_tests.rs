// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{FakeChannel, FakeReply, FakeResolver, FakeScript};
use sloth_core::{FanoutMode, FanoutPolicy, NullScriptRuntime, ScriptOutcome, Task};

fn ctx(dir: &std::path::Path, deps: (Arc<dyn ScriptRuntime>, Arc<dyn AgentResolver>, Arc<dyn AgentChannel>)) -> ExecutionContext {
    ExecutionContext {
        workdir: dir.to_path_buf(),
        env: BTreeMap::new(),
        params: BTreeMap::new(),
        dep_outputs: BTreeMap::new(),
        run: WorkflowContext {
            run_id: "run-1".to_string(),
            workflow: "wf".to_string(),
            stack: "prod".to_string(),
            params: BTreeMap::new(),
        },
        logger: TaskLogger::discard("t"),
        cancel: CancellationToken::new(),
        timeout: Some(Duration::from_secs(10)),
        script: deps.0,
        resolver: deps.1,
        channel: deps.2,
    }
}

fn local_ctx(dir: &std::path::Path) -> ExecutionContext {
    ctx(
        dir,
        (
            Arc::new(NullScriptRuntime::new()),
            Arc::new(FakeResolver::empty()),
            Arc::new(FakeChannel::new()),
        ),
    )
}

#[tokio::test]
async fn local_shell_success() {
    let dir = tempfile::tempdir().unwrap();
    let task = Task::shell("t", "true");
    let outcome = execute_task(&task, &local_ctx(dir.path())).await.unwrap();
    assert!(outcome.agents.is_empty());
    assert!(outcome.outputs.is_empty());
}

#[tokio::test]
async fn local_shell_failure_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let task = Task::shell("t", "exit 7");
    let err = execute_task(&task, &local_ctx(dir.path())).await.unwrap_err();
    match err {
        TaskError::Execution(message) => assert!(message.contains('7')),
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn local_script_returns_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let script = FakeScript::new().with_outcome(
        "deploy_fn",
        ScriptOutcome {
            success: true,
            message: "deployed".to_string(),
            outputs: [("url".to_string(), "http://x".to_string())].into(),
        },
    );
    let mut context = local_ctx(dir.path());
    context.script = Arc::new(script);

    let mut task = Task::shell("t", "unused");
    task.command = sloth_core::Command::Script(sloth_core::ScriptHandle::new("deploy_fn"));

    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.message, "deployed");
    assert_eq!(outcome.outputs.get("url").map(String::as_str), Some("http://x"));
}

#[tokio::test]
async fn local_script_without_runtime_is_a_validation_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = Task::shell("t", "unused");
    task.command = sloth_core::Command::Script(sloth_core::ScriptHandle::new("ghost"));

    let err = execute_task(&task, &local_ctx(dir.path())).await.unwrap_err();
    assert!(matches!(err, TaskError::Validation(_)));
}

#[tokio::test]
async fn delegated_dispatch_resolves_and_strips_delegation() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("10.0.0.1:7000", vec![FakeReply::ok_with_outputs(&[("host", "a1")])]);

    let context = ctx(
        dir.path(),
        (
            Arc::new(NullScriptRuntime::new()),
            Arc::new(FakeResolver::new(&[("a1", "10.0.0.1:7000")])),
            channel.clone(),
        ),
    );

    let mut task = Task::shell("deploy", "echo hi");
    task.delegate_to = DelegateTarget::Agent("a1".to_string());

    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.agents, vec!["a1".to_string()]);
    assert_eq!(outcome.outputs.get("host").map(String::as_str), Some("a1"));
    // The fake asserts internally that delegate_to arrived cleared.
    assert_eq!(channel.calls(), vec![("10.0.0.1:7000".to_string(), "deploy".to_string())]);
}

#[tokio::test]
async fn delegated_failure_result_is_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script(
        "10.0.0.1:7000",
        vec![FakeReply::Fail { message: "exit 1".to_string() }],
    );
    let context = ctx(
        dir.path(),
        (
            Arc::new(NullScriptRuntime::new()),
            Arc::new(FakeResolver::new(&[("a1", "10.0.0.1:7000")])),
            channel,
        ),
    );

    let mut task = Task::shell("deploy", "exit 1");
    task.delegate_to = DelegateTarget::Agent("a1".to_string());

    let err = execute_task(&task, &context).await.unwrap_err();
    assert!(matches!(err, TaskError::Execution(_)));
}

#[tokio::test]
async fn unknown_agent_is_a_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut task = Task::shell("deploy", "true");
    task.delegate_to = DelegateTarget::Agent("ghost".to_string());

    let err = execute_task(&task, &local_ctx(dir.path())).await.unwrap_err();
    assert!(matches!(err, TaskError::Resolution(_)));
}

fn fan_out_task(agents: &[&str]) -> Task {
    let mut task = Task::shell("fan", "true");
    task.delegate_to =
        DelegateTarget::Agents(agents.iter().map(|a| a.to_string()).collect());
    task
}

fn three_host_ctx(
    dir: &std::path::Path,
    channel: Arc<FakeChannel>,
) -> ExecutionContext {
    ctx(
        dir,
        (
            Arc::new(NullScriptRuntime::new()),
            Arc::new(FakeResolver::new(&[
                ("a", "addr-a"),
                ("b", "addr-b"),
                ("c", "addr-c"),
            ])),
            channel,
        ),
    )
}

#[tokio::test]
async fn fan_out_all_policy_requires_every_host() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("addr-b", vec![FakeReply::Fail { message: "nope".to_string() }]);
    let context = three_host_ctx(dir.path(), channel);

    let task = fan_out_task(&["a", "b", "c"]);
    let err = execute_task(&task, &context).await.unwrap_err();
    match err {
        TaskError::Execution(message) => assert!(message.contains("2/3")),
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn fan_out_any_policy_tolerates_failures() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("addr-a", vec![FakeReply::Fail { message: "nope".to_string() }]);
    channel.script("addr-b", vec![FakeReply::Transport { message: "gone".to_string() }]);
    let context = three_host_ctx(dir.path(), channel);

    let mut task = fan_out_task(&["a", "b", "c"]);
    task.fanout_policy = FanoutPolicy::Any;

    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.agents, vec!["c".to_string()]);
}

#[tokio::test]
async fn fan_out_majority_policy() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("addr-c", vec![FakeReply::Fail { message: "nope".to_string() }]);
    let context = three_host_ctx(dir.path(), channel.clone());

    let mut task = fan_out_task(&["a", "b", "c"]);
    task.fanout_policy = FanoutPolicy::Majority;

    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.message, "2/3 hosts succeeded");
}

#[tokio::test]
async fn fan_out_outputs_are_namespaced_per_host() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("addr-a", vec![FakeReply::ok_with_outputs(&[("port", "81")])]);
    channel.script("addr-b", vec![FakeReply::ok_with_outputs(&[("port", "82")])]);
    let context = three_host_ctx(dir.path(), channel);

    let task = fan_out_task(&["a", "b"]);
    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.outputs.get("a.port").map(String::as_str), Some("81"));
    assert_eq!(outcome.outputs.get("b.port").map(String::as_str), Some("82"));
}

#[tokio::test]
async fn sequential_any_stops_after_first_success() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    let context = three_host_ctx(dir.path(), channel.clone());

    let mut task = fan_out_task(&["a", "b", "c"]);
    task.fanout_mode = FanoutMode::Sequential;
    task.fanout_policy = FanoutPolicy::Any;

    let outcome = execute_task(&task, &context).await.unwrap();
    assert_eq!(outcome.agents, vec!["a".to_string()]);
    assert_eq!(channel.calls().len(), 1);
}

#[tokio::test]
async fn sequential_all_stops_at_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let channel = Arc::new(FakeChannel::new());
    channel.script("addr-a", vec![FakeReply::Fail { message: "nope".to_string() }]);
    let context = three_host_ctx(dir.path(), channel.clone());

    let mut task = fan_out_task(&["a", "b", "c"]);
    task.fanout_mode = FanoutMode::Sequential;

    let err = execute_task(&task, &context).await.unwrap_err();
    assert!(matches!(err, TaskError::Execution(_)));
    assert_eq!(channel.calls().len(), 1);
}
