// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn shell_constructor_defaults() {
    let task = Task::shell("build", "make build");
    assert_eq!(task.name, "build");
    assert_eq!(task.command, Command::Shell("make build".to_string()));
    assert!(task.delegate_to.is_local());
    assert_eq!(task.retries, 0);
    assert!(task.hooks.is_empty());
}

#[test]
fn delegate_target_serde_shapes() {
    let local = serde_json::to_value(DelegateTarget::Local).unwrap();
    assert!(local.is_null());

    let single = serde_json::to_value(DelegateTarget::Agent("a1".into())).unwrap();
    assert_eq!(single, serde_json::json!("a1"));

    let many =
        serde_json::to_value(DelegateTarget::Agents(vec!["a".into(), "b".into()])).unwrap();
    assert_eq!(many, serde_json::json!(["a", "b"]));

    let parsed: DelegateTarget = serde_json::from_value(serde_json::json!(["x"])).unwrap();
    assert_eq!(parsed, DelegateTarget::Agents(vec!["x".into()]));
}

#[test]
fn delegate_target_clear_goes_local() {
    let mut target = DelegateTarget::Agent("a1".into());
    target.clear();
    assert!(target.is_local());
}

#[yare::parameterized(
    pending = { TaskStatus::Pending, false },
    running = { TaskStatus::Running, false },
    success = { TaskStatus::Success, true },
    failed  = { TaskStatus::Failed, true },
    skipped = { TaskStatus::Skipped, true },
)]
fn terminal_statuses(status: TaskStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn workdir_policy_serde() {
    let named = WorkdirPolicy::Named("/tmp/x".into());
    let json = serde_json::to_value(&named).unwrap();
    assert_eq!(json, serde_json::json!({ "named": "/tmp/x" }));

    let inherit: WorkdirPolicy = serde_json::from_value(serde_json::json!("inherit")).unwrap();
    assert_eq!(inherit, WorkdirPolicy::Inherit);
}

#[test]
fn task_round_trips_through_json() {
    let mut task = Task::shell("deploy", "scp app host:");
    task.depends_on = vec!["build".into()];
    task.retries = 2;
    task.retry_policy = RetryPolicy::Exponential;
    task.timeout_ms = Some(60_000);
    task.delegate_to = DelegateTarget::Agent("agent-1".into());
    task.artifacts = vec!["dist/app".into()];
    task.hooks.on_failure = Some(Predicate::Shell("notify.sh".into()));

    let json = serde_json::to_string(&task).unwrap();
    let parsed: Task = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, task);
}

#[test]
fn group_task_lookup() {
    let mut group = TaskGroup::new("pipeline");
    group.tasks.push(Task::shell("a", "true"));
    group.tasks.push(Task::shell("b", "true"));

    assert_eq!(group.task("b").map(|t| t.name.as_str()), Some("b"));
    assert!(group.task("missing").is_none());
}

#[test]
fn group_config_defaults() {
    let config = GroupConfig::default();
    assert_eq!(config.max_parallel_tasks, 4);
    assert!(config.timeout_ms.is_none());
    assert!(config.circuit_breaker.is_none());
}
