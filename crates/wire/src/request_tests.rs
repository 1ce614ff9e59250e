// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_tag_with_type() {
    let request = Request::AgentResolve { name: "a1".to_string() };
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["type"], "AgentResolve");
    assert_eq!(json["name"], "a1");
}

#[test]
fn hello_token_is_omitted_when_absent() {
    let request = Request::Hello { version: "0.1.0".to_string(), token: None };
    let json = serde_json::to_value(&request).unwrap();
    assert!(json.get("token").is_none());
}

#[test]
fn run_workflow_round_trips() {
    let request = Request::RunWorkflow {
        stack: "prod".to_string(),
        source: "workflow \"x\" {}".to_string(),
        format: "hcl".to_string(),
        workflow: None,
        params: [("region".to_string(), "eu".to_string())].into(),
        base_dir: "/tmp/project".into(),
        force: false,
    };
    let bytes = serde_json::to_vec(&request).unwrap();
    let parsed: Request = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, request);
}

#[test]
fn unknown_fields_are_tolerated() {
    // Additive protocol evolution: newer masters may send extra fields.
    let parsed: Request =
        serde_json::from_str(r#"{"type":"AgentHeartbeat","name":"a1","extra":42}"#).unwrap();
    assert_eq!(parsed, Request::AgentHeartbeat { name: "a1".to_string() });
}
