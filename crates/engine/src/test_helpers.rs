// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for executor and runner tests.

use crate::channel::{AgentChannel, AgentResolver, DelegatedResult};
use crate::error::TaskError;
use crate::logger::TaskLogger;
use crate::runner::RunnerDeps;
use crate::stack::StackManager;
use crate::Runner;
use async_trait::async_trait;
use parking_lot::Mutex;
use sloth_core::{
    ModuleRegistry, NullScriptRuntime, ScriptError, ScriptHandle, ScriptOutcome, ScriptRuntime,
    SystemClock,
};
use sloth_storage::Store;
use sloth_wire::{TaskEnvelope, WorkflowContext};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Resolver backed by a fixed name → address map.
pub(crate) struct FakeResolver {
    addresses: HashMap<String, String>,
}

impl FakeResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            addresses: entries
                .iter()
                .map(|(name, addr)| (name.to_string(), addr.to_string()))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self { addresses: HashMap::new() }
    }
}

#[async_trait]
impl AgentResolver for FakeResolver {
    async fn resolve(&self, name: &str) -> Result<String, TaskError> {
        self.addresses
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::Resolution(format!("agent {name:?} not found")))
    }
}

/// Scripted reply for one dispatch to a fake agent.
#[derive(Clone)]
pub(crate) enum FakeReply {
    Success { message: String, outputs: BTreeMap<String, String>, artifacts: Vec<u8> },
    Fail { message: String },
    Transport { message: String },
}

impl FakeReply {
    pub fn ok() -> Self {
        FakeReply::Success {
            message: String::new(),
            outputs: BTreeMap::new(),
            artifacts: Vec::new(),
        }
    }

    pub fn ok_with_outputs(pairs: &[(&str, &str)]) -> Self {
        FakeReply::Success {
            message: String::new(),
            outputs: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            artifacts: Vec::new(),
        }
    }
}

/// Channel that answers from per-address scripted reply queues and records
/// every dispatch.
#[derive(Default)]
pub(crate) struct FakeChannel {
    replies: Mutex<HashMap<String, VecDeque<FakeReply>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, address: &str, replies: Vec<FakeReply>) {
        self.replies.lock().insert(address.to_string(), replies.into());
    }

    /// (address, task name) per dispatch, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AgentChannel for FakeChannel {
    async fn run_task(
        &self,
        address: &str,
        envelope: TaskEnvelope,
        _context: WorkflowContext,
        _workspace: Vec<u8>,
        _logger: &TaskLogger,
        _cancel: &CancellationToken,
        _timeout: Option<Duration>,
    ) -> Result<DelegatedResult, TaskError> {
        assert!(
            envelope.task.delegate_to.is_local(),
            "delegated task must arrive with delegation stripped"
        );
        self.calls.lock().push((address.to_string(), envelope.task.name.clone()));

        let reply = self
            .replies
            .lock()
            .get_mut(address)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(FakeReply::ok);

        match reply {
            FakeReply::Success { message, outputs, artifacts } => {
                Ok(DelegatedResult { success: true, message, outputs, artifacts })
            }
            FakeReply::Fail { message } => {
                Ok(DelegatedResult {
                    success: false,
                    message,
                    outputs: BTreeMap::new(),
                    artifacts: Vec::new(),
                })
            }
            FakeReply::Transport { message } => Err(TaskError::Transport(message)),
        }
    }
}

/// Script runtime with canned outcomes per handle.
pub(crate) struct FakeScript {
    outcomes: HashMap<String, ScriptOutcome>,
    predicates: HashMap<String, bool>,
    registry: ModuleRegistry,
}

impl FakeScript {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            predicates: HashMap::new(),
            registry: ModuleRegistry::new(),
        }
    }

    pub fn with_outcome(mut self, handle: &str, outcome: ScriptOutcome) -> Self {
        self.outcomes.insert(handle.to_string(), outcome);
        self
    }

    pub fn with_predicate(mut self, handle: &str, value: bool) -> Self {
        self.predicates.insert(handle.to_string(), value);
        self
    }
}

impl ScriptRuntime for FakeScript {
    fn invoke(
        &self,
        handle: &ScriptHandle,
        _params: &BTreeMap<String, String>,
        _dep_outputs: &BTreeMap<String, String>,
    ) -> Result<ScriptOutcome, ScriptError> {
        self.outcomes
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| ScriptError::UnknownHandle(handle.to_string()))
    }

    fn evaluate(
        &self,
        handle: &ScriptHandle,
        _params: &BTreeMap<String, String>,
    ) -> Result<bool, ScriptError> {
        self.predicates
            .get(handle.as_str())
            .copied()
            .ok_or_else(|| ScriptError::UnknownHandle(handle.to_string()))
    }

    fn modules(&self) -> &ModuleRegistry {
        &self.registry
    }
}

/// Deps for purely local runs.
pub(crate) fn local_deps() -> RunnerDeps {
    RunnerDeps {
        script: Arc::new(NullScriptRuntime::new()),
        resolver: Arc::new(FakeResolver::empty()),
        channel: Arc::new(FakeChannel::new()),
    }
}

/// A runner over a fresh store in `dir`.
pub(crate) fn test_runner(dir: &Path, deps: RunnerDeps) -> Runner<SystemClock> {
    let store = Arc::new(Store::open(&dir.join("state")).unwrap());
    Runner::new(StackManager::new(store, SystemClock), deps, SystemClock)
}
