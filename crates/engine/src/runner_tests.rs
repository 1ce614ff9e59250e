// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{local_deps, test_runner, FakeChannel, FakeReply, FakeResolver};
use sloth_core::{DelegateTarget, NullScriptRuntime, Task};
use std::sync::Arc as StdArc;

fn shell_task(name: &str, command: &str, deps: &[&str]) -> Task {
    let mut task = Task::shell(name, command);
    task.depends_on = deps.iter().map(|d| d.to_string()).collect();
    task
}

fn group_named(name: &str, tasks: Vec<Task>) -> TaskGroup {
    let mut group = TaskGroup::new(name);
    group.tasks = tasks;
    group
}

fn request(dir: &tempfile::TempDir, group: TaskGroup) -> RunRequest {
    let base = dir.path().join("base");
    std::fs::create_dir_all(&base).unwrap();
    RunRequest {
        group,
        stack: "test-stack".to_string(),
        params: BTreeMap::new(),
        definition_hash: "testhash".to_string(),
        base_dir: base,
        run_root: dir.path().join("runs"),
        force_lock: false,
    }
}

fn statuses(report: &RunReport) -> Vec<(&str, TaskStatus)> {
    report.tasks.iter().map(|(name, r)| (name.as_str(), r.status)).collect()
}

#[tokio::test]
async fn linear_pipeline_all_local_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let group = group_named(
        "pipeline",
        vec![
            shell_task("a", "echo a", &[]),
            shell_task("b", "echo b", &["a"]),
            shell_task("c", "echo c", &["b"]),
        ],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert!(report.error.is_none());
    assert_eq!(
        statuses(&report),
        vec![
            ("a", TaskStatus::Success),
            ("b", TaskStatus::Success),
            ("c", TaskStatus::Success),
        ]
    );
    assert!(report.outputs.is_empty());

    // The run record bumped the stack from version 1 to 2.
    let stack = runner.stacks().get("test-stack").unwrap();
    assert_eq!(stack.version, 2);
    assert_eq!(stack.status, StackStatus::Success);
    assert!(stack.locked_by.is_none());
}

#[tokio::test]
async fn empty_workflow_succeeds_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let report = runner
        .run(request(&dir, group_named("empty", Vec::new())), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert!(report.tasks.is_empty());
    assert_eq!(runner.stacks().get("test-stack").unwrap().version, 2);
}

#[tokio::test]
async fn conditional_skip_lets_dependents_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut gated = shell_task("gated", "echo run", &[]);
    gated.run_if = Some(Predicate::Shell("false".to_string()));
    let group = group_named(
        "conditional",
        vec![gated, shell_task("after", "echo after", &["gated"])],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert_eq!(
        statuses(&report),
        vec![("gated", TaskStatus::Skipped), ("after", TaskStatus::Success)]
    );
}

#[tokio::test]
async fn failure_skips_dependents_transitively() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let group = group_named(
        "chain",
        vec![
            shell_task("a", "exit 1", &[]),
            shell_task("b", "echo b", &["a"]),
            shell_task("c", "echo c", &["b"]),
        ],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert_eq!(
        statuses(&report),
        vec![
            ("a", TaskStatus::Failed),
            ("b", TaskStatus::Skipped),
            ("c", TaskStatus::Skipped),
        ]
    );
}

#[tokio::test]
async fn next_if_fail_runs_the_failure_handler() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut failing = shell_task("deploy", "exit 1", &[]);
    failing.next_if_fail = vec!["rollback".to_string()];
    let group = group_named(
        "handled",
        vec![
            failing,
            shell_task("rollback", "echo rolling back", &[]),
            shell_task("announce", "echo shipped", &["deploy"]),
        ],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert_eq!(
        statuses(&report),
        vec![
            ("deploy", TaskStatus::Failed),
            ("rollback", TaskStatus::Success),
            ("announce", TaskStatus::Skipped),
        ]
    );
}

#[tokio::test]
async fn parallel_fan_out_runs_in_one_tick() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut group = group_named(
        "parallel",
        vec![
            shell_task("prep", "true", &[]),
            shell_task("build_a", "sleep 0.3", &["prep"]),
            shell_task("build_b", "sleep 0.3", &["prep"]),
            shell_task("build_c", "sleep 0.3", &["prep"]),
        ],
    );
    group.config.max_parallel_tasks = 3;

    let started = std::time::Instant::now();
    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.status, StackStatus::Success);
    // Three 300ms builds in the same scheduling tick: well under the
    // 900ms a serial run would need.
    assert!(elapsed < Duration::from_millis(800), "took {elapsed:?}");
}

#[tokio::test]
async fn retries_honour_the_attempt_budget() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut flaky = shell_task("flaky", "exit 1", &[]);
    flaky.retries = 2;
    flaky.retry_delay_ms = 10;

    let report = runner
        .run(request(&dir, group_named("retrying", vec![flaky])), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    let task = report.task("flaky").unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    // retries = 2 means at most 3 executions.
    assert_eq!(task.attempts, 3);
}

#[tokio::test]
async fn retry_eventually_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());
    let base = dir.path().join("base");

    // Fails until the marker file exists, which the first attempt creates.
    let mut flaky = shell_task("flaky", "test -f marker || { touch marker; exit 1; }", &[]);
    flaky.retries = 1;
    flaky.retry_delay_ms = 10;

    std::fs::create_dir_all(&base).unwrap();
    let report = runner
        .run(request(&dir, group_named("recovers", vec![flaky])), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert_eq!(report.task("flaky").unwrap().attempts, 2);
}

#[tokio::test]
async fn delegated_failure_with_retries_hits_the_agent_each_time() {
    let dir = tempfile::tempdir().unwrap();
    let channel = StdArc::new(FakeChannel::new());
    channel.script(
        "10.0.0.1:7000",
        vec![
            FakeReply::Fail { message: "exit 1".to_string() },
            FakeReply::Fail { message: "exit 1".to_string() },
            FakeReply::Fail { message: "exit 1".to_string() },
        ],
    );
    let deps = RunnerDeps {
        script: StdArc::new(NullScriptRuntime::new()),
        resolver: StdArc::new(FakeResolver::new(&[("agent-1", "10.0.0.1:7000")])),
        channel: channel.clone(),
    };
    let runner = test_runner(dir.path(), deps);

    let mut deploy = shell_task("deploy", "exit 1", &[]);
    deploy.delegate_to = DelegateTarget::Agent("agent-1".to_string());
    deploy.retries = 2;
    deploy.retry_delay_ms = 10;

    let report = runner
        .run(request(&dir, group_named("remote", vec![deploy])), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert_eq!(report.task("deploy").unwrap().status, TaskStatus::Failed);
    assert!(report.task("deploy").unwrap().error.as_deref().unwrap_or("").contains("exit 1"));
    // Three attempts, all against agent-1.
    assert_eq!(channel.calls().len(), 3);
    assert!(channel.calls().iter().all(|(addr, _)| addr == "10.0.0.1:7000"));
}

#[tokio::test]
async fn agent_unreachable_then_reachable_recovers_on_retry() {
    let dir = tempfile::tempdir().unwrap();
    let channel = StdArc::new(FakeChannel::new());
    channel.script(
        "10.0.0.1:7000",
        vec![
            FakeReply::Transport { message: "connection refused".to_string() },
            FakeReply::ok(),
        ],
    );
    let deps = RunnerDeps {
        script: StdArc::new(NullScriptRuntime::new()),
        resolver: StdArc::new(FakeResolver::new(&[("agent-1", "10.0.0.1:7000")])),
        channel,
    };
    let runner = test_runner(dir.path(), deps);

    let mut deploy = shell_task("deploy", "true", &[]);
    deploy.delegate_to = DelegateTarget::Agent("agent-1".to_string());
    deploy.retries = 2;
    deploy.retry_delay_ms = 10;

    let report = runner
        .run(request(&dir, group_named("remote", vec![deploy])), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert_eq!(report.task("deploy").unwrap().attempts, 2);
}

#[tokio::test]
async fn abort_if_halts_the_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut guard = shell_task("guard", "echo guarded", &[]);
    guard.abort_if = Some(Predicate::Shell("true".to_string()));
    let group = group_named(
        "aborting",
        vec![guard, shell_task("after", "echo after", &["guard"])],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert!(report.error.as_deref().unwrap_or("").contains("abort_if"));
    assert_eq!(report.task("after").unwrap().status, TaskStatus::Skipped);
    // Lock released despite the abort.
    assert!(runner.stacks().get("test-stack").unwrap().locked_by.is_none());
}

#[tokio::test]
async fn workflow_timeout_cancels_running_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut group = group_named("slow", vec![shell_task("sleepy", "sleep 5", &[])]);
    group.config.timeout_ms = Some(200);

    let started = std::time::Instant::now();
    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert!(report.error.as_deref().unwrap_or("").contains("timeout"));
    assert_eq!(report.task("sleepy").unwrap().status, TaskStatus::Failed);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn external_cancellation_aborts_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let group = group_named("cancellable", vec![shell_task("sleepy", "sleep 5", &[])]);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let report = runner.run(request(&dir, group), cancel).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(runner.stacks().get("test-stack").unwrap().locked_by.is_none());
}

#[tokio::test]
async fn circuit_breaker_skips_remaining_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut group = group_named(
        "fragile",
        vec![
            shell_task("f1", "exit 1", &[]),
            shell_task("f2", "exit 1", &["f1"]),
            shell_task("f3", "echo never", &["f2"]),
            shell_task("solo", "echo also never", &[]),
        ],
    );
    // f1 fails; f2 would be skipped anyway; the breaker trips on
    // consecutive failures from independent tasks.
    group.config.max_parallel_tasks = 1;
    group.config.circuit_breaker = Some(1);

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.status, StackStatus::Failed);
    assert!(report.error.as_deref().unwrap_or("").contains("circuit breaker"));
    assert_eq!(report.task("solo").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn artifacts_flow_to_consumers() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let mut producer = shell_task("build", "mkdir -p dist && echo binary > dist/app", &[]);
    producer.workdir = sloth_core::WorkdirPolicy::Fresh;
    producer.artifacts = vec!["dist/app".to_string()];

    let mut consumer = shell_task("verify", "test -f dist/app", &["build"]);
    consumer.workdir = sloth_core::WorkdirPolicy::Fresh;
    consumer.consumes = vec!["dist/app".to_string()];

    let report = runner
        .run(
            request(&dir, group_named("artifacts", vec![producer, consumer])),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report.status, StackStatus::Success);
    assert_eq!(report.task("verify").unwrap().status, TaskStatus::Success);
}

#[tokio::test]
async fn script_outputs_are_recorded_into_the_stack() {
    use crate::test_helpers::FakeScript;
    use sloth_core::{Command, ScriptHandle, ScriptOutcome};

    let dir = tempfile::tempdir().unwrap();
    let script = FakeScript::new().with_outcome(
        "export_fn",
        ScriptOutcome {
            success: true,
            message: String::new(),
            outputs: [("endpoint".to_string(), "http://svc".to_string())].into(),
        },
    );
    let deps = RunnerDeps {
        script: StdArc::new(script),
        resolver: StdArc::new(FakeResolver::empty()),
        channel: StdArc::new(FakeChannel::new()),
    };
    let runner = test_runner(dir.path(), deps);

    let mut task = shell_task("export", "unused", &[]);
    task.command = Command::Script(ScriptHandle::new("export_fn"));

    let report = runner
        .run(request(&dir, group_named("exports", vec![task])), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outputs.get("endpoint").map(String::as_str), Some("http://svc"));
    let stack = runner.stacks().get("test-stack").unwrap();
    assert_eq!(stack.outputs.get("endpoint").map(String::as_str), Some("http://svc"));
}

#[tokio::test]
async fn locked_stack_rejects_a_second_run() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let stack = runner.stacks().ensure("test-stack").unwrap();
    runner
        .stacks()
        .begin_run(
            stack.id,
            sloth_core::RunRecord {
                run_id: RunId::new(),
                workflow: "other".to_string(),
                definition_hash: "h".to_string(),
                status: StackStatus::Running,
                started_at_ms: 0,
                finished_at_ms: None,
                error: None,
            },
            "someone-else",
            false,
        )
        .unwrap();

    let err = runner
        .run(
            request(&dir, group_named("blocked", vec![shell_task("t", "true", &[])])),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StackError::Locked { .. }));
}

#[tokio::test]
async fn each_task_reaches_exactly_one_terminal_state() {
    let dir = tempfile::tempdir().unwrap();
    let runner = test_runner(dir.path(), local_deps());

    let group = group_named(
        "mixed",
        vec![
            shell_task("ok", "true", &[]),
            shell_task("bad", "exit 1", &[]),
            shell_task("downstream", "true", &["bad"]),
        ],
    );

    let report =
        runner.run(request(&dir, group), CancellationToken::new()).await.unwrap();

    assert_eq!(report.tasks.len(), 3);
    for (name, task) in &report.tasks {
        assert!(task.status.is_terminal(), "task {name} ended as {}", task.status);
    }
}
