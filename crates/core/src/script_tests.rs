// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::BTreeMap;

#[test]
fn registry_lookup_is_explicit() {
    let mut registry = ModuleRegistry::new();
    registry.register_module("docker", &[Capability::Exec, Capability::Network]);

    assert!(registry.supports("docker", Capability::Exec));
    assert!(!registry.supports("docker", Capability::StateWrite));
    assert!(!registry.supports("git", Capability::Exec));
    assert_eq!(registry.capabilities("docker").map(<[Capability]>::len), Some(2));
}

#[test]
fn re_registration_replaces_capabilities() {
    let mut registry = ModuleRegistry::new();
    registry.register_module("pkg", &[Capability::Exec]);
    registry.register_module("pkg", &[Capability::Files]);

    assert!(!registry.supports("pkg", Capability::Exec));
    assert!(registry.supports("pkg", Capability::Files));
}

#[test]
fn names_are_sorted() {
    let mut registry = ModuleRegistry::new();
    registry.register_module("zeta", &[]);
    registry.register_module("alpha", &[]);
    let names: Vec<&str> = registry.names().collect();
    assert_eq!(names, vec!["alpha", "zeta"]);
}

#[test]
fn null_runtime_rejects_every_handle() {
    let runtime = NullScriptRuntime::new();
    let handle = ScriptHandle::new("deploy_fn");
    let empty = BTreeMap::new();

    assert!(matches!(
        runtime.invoke(&handle, &empty, &empty),
        Err(ScriptError::UnknownHandle(_))
    ));
    assert!(matches!(runtime.evaluate(&handle, &empty), Err(ScriptError::UnknownHandle(_))));
    assert_eq!(runtime.modules().names().count(), 0);
}

#[test]
fn handle_serde_is_transparent() {
    let handle = ScriptHandle::new("fn-1");
    assert_eq!(serde_json::to_string(&handle).unwrap(), "\"fn-1\"");
}
