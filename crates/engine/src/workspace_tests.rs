// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sloth_core::Task;

fn workspace() -> (tempfile::TempDir, RunWorkspace) {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base");
    std::fs::create_dir_all(&base).unwrap();
    let ws = RunWorkspace::new(base, dir.path().join("run")).unwrap();
    (dir, ws)
}

#[test]
fn inherit_resolves_to_base() {
    let (_dir, ws) = workspace();
    let task = Task::shell("t", "true");
    assert_eq!(ws.prepare_task_dir(&task).unwrap(), ws.base());
}

#[test]
fn fresh_dir_is_recreated_empty() {
    let (_dir, ws) = workspace();
    let mut task = Task::shell("t", "true");
    task.workdir = WorkdirPolicy::Fresh;

    let first = ws.prepare_task_dir(&task).unwrap();
    std::fs::write(first.join("leftover"), b"x").unwrap();

    let second = ws.prepare_task_dir(&task).unwrap();
    assert_eq!(first, second);
    assert!(!second.join("leftover").exists());
}

#[test]
fn named_dir_is_created_relative_to_base() {
    let (_dir, ws) = workspace();
    let mut task = Task::shell("t", "true");
    task.workdir = WorkdirPolicy::Named("scratch/area".into());

    let resolved = ws.prepare_task_dir(&task).unwrap();
    assert_eq!(resolved, ws.base().join("scratch/area"));
    assert!(resolved.is_dir());
}

#[test]
fn collect_then_stage_moves_artifacts_between_tasks() {
    let (_dir, mut ws) = workspace();
    let producer_dir = ws.base().join("producer");
    std::fs::create_dir_all(producer_dir.join("dist")).unwrap();
    std::fs::write(producer_dir.join("dist/app"), b"bin").unwrap();

    let collected = ws
        .pool_mut()
        .collect("build", &["dist/app".to_string()], &producer_dir)
        .unwrap();
    assert_eq!(collected, vec!["dist/app".to_string()]);
    assert!(ws.pool().contains("dist/app"));

    let consumer_dir = ws.base().join("consumer");
    std::fs::create_dir_all(&consumer_dir).unwrap();
    ws.pool().stage("deploy", &["dist/app".to_string()], &consumer_dir).unwrap();
    assert_eq!(std::fs::read(consumer_dir.join("dist/app")).unwrap(), b"bin");
}

#[test]
fn glob_patterns_collect_multiple_files() {
    let (_dir, mut ws) = workspace();
    let from = ws.base().join("out");
    std::fs::create_dir_all(&from).unwrap();
    std::fs::write(from.join("a.log"), b"a").unwrap();
    std::fs::write(from.join("b.log"), b"b").unwrap();
    std::fs::write(from.join("c.txt"), b"c").unwrap();

    let mut collected =
        ws.pool_mut().collect("t", &["*.log".to_string()], &from).unwrap();
    collected.sort();
    assert_eq!(collected, vec!["a.log".to_string(), "b.log".to_string()]);
    assert!(!ws.pool().contains("c.txt"));
}

#[test]
fn overlapping_artifact_is_last_writer_wins() {
    let (_dir, mut ws) = workspace();
    let first = ws.base().join("first");
    let second = ws.base().join("second");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    std::fs::write(first.join("shared.txt"), b"from first").unwrap();
    std::fs::write(second.join("shared.txt"), b"from second").unwrap();

    ws.pool_mut().collect("one", &["shared.txt".to_string()], &first).unwrap();
    ws.pool_mut().collect("two", &["shared.txt".to_string()], &second).unwrap();

    let staged = ws.base().join("staged");
    std::fs::create_dir_all(&staged).unwrap();
    ws.pool().stage("reader", &["shared.txt".to_string()], &staged).unwrap();
    assert_eq!(std::fs::read(staged.join("shared.txt")).unwrap(), b"from second");
}

#[test]
fn staging_a_missing_artifact_is_an_error() {
    let (_dir, ws) = workspace();
    let into = ws.base().join("into");
    std::fs::create_dir_all(&into).unwrap();
    let err = ws.pool().stage("t", &["ghost.bin".to_string()], &into).unwrap_err();
    assert!(matches!(err, WorkspaceError::MissingArtifact { .. }));
}

#[test]
fn directory_artifacts_copy_recursively() {
    let (_dir, mut ws) = workspace();
    let from = ws.base().join("out");
    std::fs::create_dir_all(from.join("site/css")).unwrap();
    std::fs::write(from.join("site/index.html"), b"<html>").unwrap();
    std::fs::write(from.join("site/css/main.css"), b"body{}").unwrap();

    ws.pool_mut().collect("t", &["site".to_string()], &from).unwrap();

    let staged = ws.base().join("staged");
    std::fs::create_dir_all(&staged).unwrap();
    ws.pool().stage("r", &["site".to_string()], &staged).unwrap();
    assert_eq!(std::fs::read(staged.join("site/css/main.css")).unwrap(), b"body{}");
}
