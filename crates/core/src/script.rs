// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script runtime seam.
//!
//! The scripting front-end is an external collaborator. Tasks reference
//! script code through opaque [`ScriptHandle`]s: stable string identifiers
//! that can be persisted and replayed after restart. Script modules declare
//! their operations up front through a [`ModuleRegistry`] with a fixed
//! capability set; there is no dynamic field access.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Opaque, serialisable reference to a callable in the script runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScriptHandle(pub String);

impl ScriptHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of invoking a script command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOutcome {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// Errors from the script runtime.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("unknown script handle: {0}")]
    UnknownHandle(String),
    #[error("script runtime not available")]
    RuntimeUnavailable,
    #[error("script failed: {0}")]
    Failed(String),
}

/// The enumerated operations a script module may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Run subprocesses on the executing host.
    Exec,
    /// Read and write files in the task workspace.
    Files,
    /// Open outbound network connections.
    Network,
    /// Read stack state and outputs.
    StateRead,
    /// Record resources and outputs into the stack.
    StateWrite,
}

/// Typed module catalogue: module name to declared capabilities.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Vec<Capability>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module with its capability set. Re-registration replaces
    /// the previous declaration.
    pub fn register_module(&mut self, name: impl Into<String>, capabilities: &[Capability]) {
        self.modules.insert(name.into(), capabilities.to_vec());
    }

    /// Capabilities declared by a module, if registered.
    pub fn capabilities(&self, name: &str) -> Option<&[Capability]> {
        self.modules.get(name).map(Vec::as_slice)
    }

    /// Explicit capability look-up, replacing dynamic field access.
    pub fn supports(&self, name: &str, capability: Capability) -> bool {
        self.modules.get(name).is_some_and(|caps| caps.contains(&capability))
    }

    /// Registered module names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

/// Embedded script runtime interface.
///
/// Implementations invoke script callables by handle. The engine never sees
/// script values, only [`ScriptOutcome`]s and booleans.
pub trait ScriptRuntime: Send + Sync {
    /// Invoke a script command with run parameters and the outputs of the
    /// task's dependencies.
    fn invoke(
        &self,
        handle: &ScriptHandle,
        params: &BTreeMap<String, String>,
        dep_outputs: &BTreeMap<String, String>,
    ) -> Result<ScriptOutcome, ScriptError>;

    /// Evaluate a script predicate (run_if / abort_if / hooks).
    fn evaluate(
        &self,
        handle: &ScriptHandle,
        params: &BTreeMap<String, String>,
    ) -> Result<bool, ScriptError>;

    /// The runtime's module catalogue.
    fn modules(&self) -> &ModuleRegistry;
}

/// Runtime stand-in for processes without a scripting front-end: every
/// handle is unknown.
#[derive(Debug, Default)]
pub struct NullScriptRuntime {
    registry: ModuleRegistry,
}

impl NullScriptRuntime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScriptRuntime for NullScriptRuntime {
    fn invoke(
        &self,
        handle: &ScriptHandle,
        _params: &BTreeMap<String, String>,
        _dep_outputs: &BTreeMap<String, String>,
    ) -> Result<ScriptOutcome, ScriptError> {
        Err(ScriptError::UnknownHandle(handle.0.clone()))
    }

    fn evaluate(
        &self,
        handle: &ScriptHandle,
        _params: &BTreeMap<String, String>,
    ) -> Result<bool, ScriptError> {
        Err(ScriptError::UnknownHandle(handle.0.clone()))
    }

    fn modules(&self) -> &ModuleRegistry {
        &self.registry
    }
}

#[cfg(test)]
#[path = "script_tests.rs"]
mod tests;
