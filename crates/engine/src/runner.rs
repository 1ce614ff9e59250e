// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The run loop.
//!
//! One logical scheduling loop drives a run: it marks skips, schedules
//! ready tasks (definition order, bounded by `max_parallel_tasks`), and
//! applies completions as worker tasks report back over a channel. Each
//! scheduled task runs its own lifecycle: conditionals, hooks, workspace
//! staging, executor attempts with retry back-off, artifact collection.

use crate::channel::{AgentChannel, AgentResolver};
use crate::error::TaskError;
use crate::executor::{self, ExecutionContext};
use crate::graph::TaskGraph;
use crate::logger::TaskLogger;
use crate::stack::{StackError, StackManager};
use crate::subprocess::{run_shell, SHELL_HOOK_TIMEOUT};
use crate::workspace::RunWorkspace;
use sloth_core::{
    apply_jitter, retry_delay, Clock, Predicate, RunId, RunRecord, ScriptRuntime, StackId,
    StackStatus, Task, TaskGroup, TaskStatus,
};
use sloth_wire::{RunReport, StackRef, TaskReport, WorkflowContext};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Collaborators injected at the composition root.
#[derive(Clone)]
pub struct RunnerDeps {
    pub script: Arc<dyn ScriptRuntime>,
    pub resolver: Arc<dyn AgentResolver>,
    pub channel: Arc<dyn AgentChannel>,
}

/// One workflow run against one stack.
pub struct RunRequest {
    pub group: TaskGroup,
    /// Stack name; created on first use.
    pub stack: String,
    pub params: BTreeMap<String, String>,
    /// Content hash of the definition, recorded in run history.
    pub definition_hash: String,
    /// The workflow's working directory (`workdir = "inherit"`).
    pub base_dir: PathBuf,
    /// Parent directory for per-run workspaces and logs.
    pub run_root: PathBuf,
    /// Steal an expired stack lock.
    pub force_lock: bool,
}

/// What a finished task reports back to the loop.
struct TaskFinish {
    name: String,
    status: TaskStatus,
    error: Option<String>,
    outputs: BTreeMap<String, String>,
    duration_ms: u64,
    attempts: u32,
    agents: Vec<String>,
    /// `abort_if` fired: stop the whole workflow.
    abort: Option<String>,
    /// Validation/state/internal failure: stop the whole workflow.
    fatal: bool,
}

/// Drives task groups to completion.
pub struct Runner<C: Clock> {
    stacks: StackManager<C>,
    deps: RunnerDeps,
    clock: C,
}

impl<C: Clock> Runner<C> {
    pub fn new(stacks: StackManager<C>, deps: RunnerDeps, clock: C) -> Self {
        Self { stacks, deps, clock }
    }

    pub fn stacks(&self) -> &StackManager<C> {
        &self.stacks
    }

    /// Execute a run to completion.
    ///
    /// `external_cancel` aborts the run from outside (client disconnect,
    /// master shutdown). Lock contention and store failures surface as
    /// errors; task failures come back inside the report.
    pub async fn run(
        &self,
        request: RunRequest,
        external_cancel: CancellationToken,
    ) -> Result<RunReport, StackError> {
        let RunRequest { group, stack, params, definition_hash, base_dir, run_root, force_lock } =
            request;
        let started_at_ms = self.clock.epoch_ms();
        let started = std::time::Instant::now();

        let stack = self.stacks.ensure(&stack)?;
        let run_id = RunId::new();
        let holder = format!("{run_id}:{}", uuid::Uuid::new_v4());

        let run_record = RunRecord {
            run_id,
            workflow: group.name.clone(),
            definition_hash,
            status: StackStatus::Running,
            started_at_ms,
            finished_at_ms: None,
            error: None,
        };
        self.stacks.begin_run(stack.id, run_record, &holder, force_lock)?;

        info!(run = %run_id, workflow = %group.name, stack = %stack.name, "run started");

        let context = WorkflowContext {
            run_id: run_id.to_string(),
            workflow: group.name.clone(),
            stack: stack.name.clone(),
            params: params.clone(),
        };

        self.run_group_hook(&group.hooks.on_start, "on_start", &base_dir, &params, None).await;

        let outcome = self
            .drive(&group, stack.id, &holder, &base_dir, &run_root, context, external_cancel)
            .await;

        let (mut reports, run_outputs, abort_reason) = match outcome {
            Ok(parts) => parts,
            Err(e) => {
                // Workspace setup failed before any task ran.
                self.stacks.end_run(
                    stack.id,
                    run_id,
                    &holder,
                    StackStatus::Failed,
                    Some(e.to_string()),
                )?;
                return Ok(RunReport {
                    run_id: run_id.to_string(),
                    workflow: group.name.clone(),
                    stack: StackRef { id: stack.id.to_string(), name: stack.name.clone() },
                    status: StackStatus::Failed,
                    started_at_ms,
                    duration_ms: started.elapsed().as_millis() as u64,
                    tasks: Vec::new(),
                    outputs: BTreeMap::new(),
                    error: Some(e.to_string()),
                });
            }
        };

        let failed_count =
            reports.values().filter(|r| r.status == TaskStatus::Failed).count();
        let aborted = abort_reason.is_some();
        let (status, error) = if let Some(reason) = abort_reason {
            (StackStatus::Failed, Some(reason))
        } else if failed_count > 0 {
            (StackStatus::Failed, Some(format!("{failed_count} task(s) failed")))
        } else {
            (StackStatus::Success, None)
        };

        if aborted {
            self.run_group_hook(&group.hooks.on_abort, "on_abort", &base_dir, &params, Some(status))
                .await;
        }
        self.run_group_hook(
            &group.hooks.on_complete,
            "on_complete",
            &base_dir,
            &params,
            Some(status),
        )
        .await;

        self.stacks.end_run(stack.id, run_id, &holder, status, error.clone())?;

        info!(run = %run_id, status = %status, "run finished");

        // Tasks in definition order for the report.
        let tasks = group
            .tasks
            .iter()
            .map(|task| {
                let report = reports.remove(&task.name).unwrap_or(TaskReport {
                    status: TaskStatus::Skipped,
                    duration_ms: 0,
                    attempts: 0,
                    error: None,
                    agents: Vec::new(),
                });
                (task.name.clone(), report)
            })
            .collect();

        Ok(RunReport {
            run_id: run_id.to_string(),
            workflow: group.name,
            stack: StackRef { id: stack.id.to_string(), name: stack.name },
            status,
            started_at_ms,
            duration_ms: started.elapsed().as_millis() as u64,
            tasks,
            outputs: run_outputs,
            error,
        })
    }

    /// The scheduling loop proper. Returns per-task reports, run outputs,
    /// and the abort reason if the run halted early.
    #[allow(clippy::type_complexity, clippy::too_many_arguments)]
    async fn drive(
        &self,
        group: &TaskGroup,
        stack_id: StackId,
        holder: &str,
        base_dir: &std::path::Path,
        run_root: &std::path::Path,
        context: WorkflowContext,
        external_cancel: CancellationToken,
    ) -> Result<
        (HashMap<String, TaskReport>, BTreeMap<String, String>, Option<String>),
        TaskError,
    > {
        let run_dir = run_root.join(context.run_id.as_str());
        let mut workspace = RunWorkspace::new(base_dir.to_path_buf(), run_dir.clone())
            .map_err(TaskError::from)?;
        let log_path = run_dir.join("run.log");

        let graph = TaskGraph::build(group);
        let mut states: HashMap<String, TaskStatus> =
            group.tasks.iter().map(|t| (t.name.clone(), TaskStatus::Pending)).collect();
        let mut poisoned: HashSet<String> = HashSet::new();
        let mut reports: HashMap<String, TaskReport> = HashMap::new();
        let mut outputs_by_task: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        let mut run_outputs: BTreeMap<String, String> = BTreeMap::new();
        let mut task_dirs: HashMap<String, PathBuf> = HashMap::new();

        let (tx, mut rx) = mpsc::channel::<TaskFinish>(group.tasks.len().max(1));
        let cancel = CancellationToken::new();
        let mut running = 0usize;
        let mut halted = false;
        let mut abort_reason: Option<String> = None;
        let mut consecutive_failures = 0u32;
        let max_parallel = group.config.max_parallel_tasks.max(1);
        let deadline = group
            .config
            .timeout_ms
            .map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));

        loop {
            if !halted {
                // Settle skips and schedule ready tasks until nothing moves.
                loop {
                    let (ready, skips) = graph.ready_and_skips(&states, &poisoned);
                    let mut progressed = false;

                    for (name, poison) in skips {
                        states.insert(name.clone(), TaskStatus::Skipped);
                        if poison {
                            poisoned.insert(name.clone());
                        }
                        reports.insert(
                            name,
                            TaskReport {
                                status: TaskStatus::Skipped,
                                duration_ms: 0,
                                attempts: 0,
                                error: poison.then(|| "upstream task failed".to_string()),
                                agents: Vec::new(),
                            },
                        );
                        progressed = true;
                    }

                    for name in ready {
                        if running >= max_parallel {
                            break;
                        }
                        let Some(task) = group.task(&name) else { continue };
                        match self.start_task(
                            task,
                            &mut workspace,
                            &outputs_by_task,
                            &context,
                            &log_path,
                            &cancel,
                            &tx,
                        ) {
                            Ok(dir) => {
                                task_dirs.insert(name.clone(), dir);
                                states.insert(name.clone(), TaskStatus::Running);
                                running += 1;
                            }
                            Err(e) => {
                                // Staging failed; the task never started.
                                states.insert(name.clone(), TaskStatus::Failed);
                                consecutive_failures += 1;
                                reports.insert(
                                    name.clone(),
                                    TaskReport {
                                        status: TaskStatus::Failed,
                                        duration_ms: 0,
                                        attempts: 0,
                                        error: Some(e.to_string()),
                                        agents: Vec::new(),
                                    },
                                );
                            }
                        }
                        progressed = true;
                    }

                    if !progressed {
                        break;
                    }
                }
            }

            if running == 0 {
                let (ready, skips) = graph.ready_and_skips(&states, &poisoned);
                if halted || (ready.is_empty() && skips.is_empty()) {
                    break;
                }
                continue;
            }

            let deadline_sleep = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                Some(finish) = rx.recv() => {
                    running -= 1;
                    self.apply_finish(
                        finish,
                        group,
                        stack_id,
                        holder,
                        &mut states,
                        &mut reports,
                        &mut outputs_by_task,
                        &mut run_outputs,
                        &mut workspace,
                        &task_dirs,
                        &mut consecutive_failures,
                        &mut halted,
                        &mut abort_reason,
                        &cancel,
                    );
                }
                _ = deadline_sleep, if !halted => {
                    halted = true;
                    abort_reason = Some("workflow timeout exceeded".to_string());
                    cancel.cancel();
                }
                _ = external_cancel.cancelled(), if !halted => {
                    halted = true;
                    abort_reason = Some("run cancelled".to_string());
                    cancel.cancel();
                }
            }
        }

        // Whatever never got to run is skipped.
        for name in graph.order() {
            if states.get(name.as_str()).copied() == Some(TaskStatus::Pending) {
                states.insert(name.clone(), TaskStatus::Skipped);
                reports.insert(
                    name.clone(),
                    TaskReport {
                        status: TaskStatus::Skipped,
                        duration_ms: 0,
                        attempts: 0,
                        error: None,
                        agents: Vec::new(),
                    },
                );
            }
        }

        Ok((reports, run_outputs, abort_reason))
    }

    /// Prepare a task's workspace and spawn its lifecycle worker.
    fn start_task(
        &self,
        task: &Task,
        workspace: &mut RunWorkspace,
        outputs_by_task: &HashMap<String, BTreeMap<String, String>>,
        context: &WorkflowContext,
        log_path: &std::path::Path,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<TaskFinish>,
    ) -> Result<PathBuf, TaskError> {
        let dir = workspace.prepare_task_dir(task).map_err(TaskError::from)?;
        workspace
            .pool()
            .stage(&task.name, &task.consumes, &dir)
            .map_err(TaskError::from)?;

        let mut dep_outputs = BTreeMap::new();
        for dep in &task.depends_on {
            if let Some(outputs) = outputs_by_task.get(dep) {
                for (key, value) in outputs {
                    dep_outputs.insert(key.clone(), value.clone());
                }
            }
        }

        let ctx = ExecutionContext {
            workdir: dir.clone(),
            env: task.env.clone(),
            params: task.params.clone(),
            dep_outputs,
            run: context.clone(),
            logger: TaskLogger::new(&task.name, Some(log_path)),
            cancel: cancel.child_token(),
            timeout: task.timeout_ms.map(Duration::from_millis),
            script: Arc::clone(&self.deps.script),
            resolver: Arc::clone(&self.deps.resolver),
            channel: Arc::clone(&self.deps.channel),
        };

        let entropy = self.clock.epoch_ms() as u32;
        tokio::spawn(lifecycle(task.clone(), ctx, tx.clone(), entropy));
        Ok(dir)
    }

    /// Fold one completion into the loop state.
    #[allow(clippy::too_many_arguments)]
    fn apply_finish(
        &self,
        finish: TaskFinish,
        group: &TaskGroup,
        stack_id: StackId,
        holder: &str,
        states: &mut HashMap<String, TaskStatus>,
        reports: &mut HashMap<String, TaskReport>,
        outputs_by_task: &mut HashMap<String, BTreeMap<String, String>>,
        run_outputs: &mut BTreeMap<String, String>,
        workspace: &mut RunWorkspace,
        task_dirs: &HashMap<String, PathBuf>,
        consecutive_failures: &mut u32,
        halted: &mut bool,
        abort_reason: &mut Option<String>,
        cancel: &CancellationToken,
    ) {
        let name = finish.name.clone();
        states.insert(name.clone(), finish.status);

        match finish.status {
            TaskStatus::Failed => *consecutive_failures += 1,
            TaskStatus::Success => *consecutive_failures = 0,
            _ => {}
        }

        if let Some(reason) = &finish.abort {
            if !*halted {
                *halted = true;
                *abort_reason = Some(reason.clone());
                cancel.cancel();
            }
        }
        if finish.fatal && !*halted {
            *halted = true;
            *abort_reason =
                Some(finish.error.clone().unwrap_or_else(|| "internal error".to_string()));
            cancel.cancel();
        }
        if let Some(limit) = group.config.circuit_breaker {
            if *consecutive_failures >= limit && !*halted {
                // Fail fast: stop scheduling, but let in-flight tasks land.
                *halted = true;
                *abort_reason = Some(format!(
                    "circuit breaker tripped after {consecutive_failures} consecutive failures"
                ));
            }
        }

        if finish.status == TaskStatus::Success {
            if let (Some(dir), Some(task)) = (task_dirs.get(&name), group.task(&name)) {
                if !task.artifacts.is_empty() {
                    if let Err(e) =
                        workspace.pool_mut().collect(&name, &task.artifacts, dir)
                    {
                        warn!(task = %name, error = %e, "artifact collection failed");
                    }
                }
            }
            for (key, value) in &finish.outputs {
                run_outputs.insert(key.clone(), value.clone());
                if let Err(e) = self.stacks.record_output(stack_id, key, value) {
                    warn!(task = %name, error = %e, "output record failed");
                }
            }
            outputs_by_task.insert(name.clone(), finish.outputs.clone());
        }

        reports.insert(
            name,
            TaskReport {
                status: finish.status,
                duration_ms: finish.duration_ms,
                attempts: finish.attempts,
                error: finish.error,
                agents: finish.agents,
            },
        );

        // Progress refreshes the run lock.
        if let Err(e) = self.stacks.refresh_lock(stack_id, holder) {
            warn!(error = %e, "lock refresh failed");
        }
    }

    /// Run a workflow-level hook. Failures are logged, never fatal.
    async fn run_group_hook(
        &self,
        hook: &Option<Predicate>,
        what: &str,
        base_dir: &std::path::Path,
        params: &BTreeMap<String, String>,
        status: Option<StackStatus>,
    ) {
        let Some(hook) = hook else { return };
        let result = match hook {
            Predicate::Shell(command) => {
                let mut env = BTreeMap::new();
                if let Some(status) = status {
                    env.insert("SLOTH_RUN_STATUS".to_string(), status.to_string());
                }
                run_shell(command, base_dir, &env, SHELL_HOOK_TIMEOUT)
                    .await
                    .map(|o| o.success())
            }
            Predicate::Script(handle) => {
                let script = Arc::clone(&self.deps.script);
                let handle = handle.clone();
                let params = params.clone();
                tokio::task::spawn_blocking(move || script.evaluate(&handle, &params))
                    .await
                    .map_err(|e| TaskError::Internal(format!("hook panicked: {e}")))
                    .and_then(|r| r.map_err(|e| TaskError::Execution(e.to_string())))
            }
        };
        if let Err(e) = result {
            warn!(hook = what, error = %e, "workflow hook failed");
        }
    }
}

/// Evaluate a predicate in the task's context.
async fn eval_predicate(
    predicate: &Predicate,
    ctx: &ExecutionContext,
) -> Result<bool, TaskError> {
    match predicate {
        Predicate::Shell(command) => {
            let output = run_shell(command, &ctx.workdir, &ctx.env, SHELL_HOOK_TIMEOUT).await?;
            Ok(output.success())
        }
        Predicate::Script(handle) => {
            let script = Arc::clone(&ctx.script);
            let handle = handle.clone();
            let params = ctx.params.clone();
            tokio::task::spawn_blocking(move || script.evaluate(&handle, &params))
                .await
                .map_err(|e| TaskError::Internal(format!("predicate panicked: {e}")))?
                .map_err(|e| TaskError::Execution(e.to_string()))
        }
    }
}

/// Run a task-level hook. Failures are logged, never fatal.
async fn run_task_hook(hook: &Option<Predicate>, what: &str, ctx: &ExecutionContext) {
    let Some(hook) = hook else { return };
    if let Err(e) = eval_predicate(hook, ctx).await {
        warn!(hook = what, error = %e, "task hook failed");
    }
}

/// One task's lifecycle, start to terminal state.
async fn lifecycle(
    task: Task,
    ctx: ExecutionContext,
    tx: mpsc::Sender<TaskFinish>,
    entropy: u32,
) {
    let started = std::time::Instant::now();
    let mut finish = run_lifecycle(&task, &ctx, entropy).await;
    finish.duration_ms = started.elapsed().as_millis() as u64;
    let _ = tx.send(finish).await;
}

async fn run_lifecycle(task: &Task, ctx: &ExecutionContext, entropy: u32) -> TaskFinish {
    let mut finish = TaskFinish {
        name: task.name.clone(),
        status: TaskStatus::Failed,
        error: None,
        outputs: BTreeMap::new(),
        duration_ms: 0,
        attempts: 0,
        agents: Vec::new(),
        abort: None,
        fatal: false,
    };

    if let Some(predicate) = &task.run_if {
        match eval_predicate(predicate, ctx).await {
            Ok(true) => {}
            Ok(false) => {
                finish.status = TaskStatus::Skipped;
                return finish;
            }
            Err(e) => {
                finish.error = Some(format!("run_if failed: {e}"));
                return finish;
            }
        }
    }

    if let Some(predicate) = &task.abort_if {
        match eval_predicate(predicate, ctx).await {
            Ok(true) => {
                finish.status = TaskStatus::Skipped;
                finish.abort = Some(format!("abort_if fired on task {:?}", task.name));
                return finish;
            }
            Ok(false) => {}
            Err(e) => {
                finish.error = Some(format!("abort_if failed: {e}"));
                return finish;
            }
        }
    }

    run_task_hook(&task.hooks.pre_exec, "pre_exec", ctx).await;

    let max_attempts = task.retries + 1;
    loop {
        finish.attempts += 1;
        match executor::execute_task(task, ctx).await {
            Ok(outcome) => {
                finish.status = TaskStatus::Success;
                finish.outputs = outcome.outputs;
                finish.agents = outcome.agents;
                run_task_hook(&task.hooks.on_success, "on_success", ctx).await;
                break;
            }
            Err(e) => {
                let may_retry = e.is_retryable()
                    && finish.attempts < max_attempts
                    && !ctx.cancel.is_cancelled();
                if may_retry {
                    let base = Duration::from_millis(task.retry_delay_ms);
                    let delay = apply_jitter(
                        retry_delay(task.retry_policy, base, finish.attempts - 1),
                        entropy.wrapping_add(finish.attempts),
                    );
                    warn!(
                        task = %task.name,
                        attempt = finish.attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "task failed, retrying"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = ctx.cancel.cancelled() => {
                            finish.error =
                                Some("cancelled during retry back-off".to_string());
                            break;
                        }
                    }
                }

                finish.fatal = matches!(
                    e,
                    TaskError::Validation(_) | TaskError::State(_) | TaskError::Internal(_)
                );
                finish.error = Some(e.to_string());
                run_task_hook(&task.hooks.on_failure, "on_failure", ctx).await;
                break;
            }
        }
    }

    run_task_hook(&task.hooks.post_exec, "post_exec", ctx).await;
    finish
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
