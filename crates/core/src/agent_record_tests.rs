// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_record_is_active_with_fresh_heartbeat() {
    let record = AgentRecord::new("a1", "127.0.0.1:7000", "0.1.0", serde_json::Value::Null, 500);
    assert_eq!(record.status, AgentStatus::Active);
    assert_eq!(record.last_heartbeat_ms, 500);
    assert_eq!(record.last_info_collected_ms, 500);
    assert!(record.accepts_work());
}

#[yare::parameterized(
    fresh          = { 1_000, 1_000, false },
    at_threshold   = { 1_000, 91_000, false },
    past_threshold = { 1_000, 91_001, true },
)]
fn staleness_threshold(heartbeat_ms: u64, now_ms: u64, stale: bool) {
    let record = AgentRecord::builder().last_heartbeat_ms(heartbeat_ms).build();
    assert_eq!(record.is_stale(now_ms), stale);
}

#[test]
fn inactive_agent_rejects_work_but_stays_queryable() {
    let record = AgentRecord::builder()
        .status(AgentStatus::Inactive)
        .inactive_reason("missed heartbeats")
        .build();
    assert!(!record.accepts_work());
    assert_eq!(record.inactive_reason.as_deref(), Some("missed heartbeats"));
}

#[test]
fn record_round_trips_through_json() {
    let record = AgentRecord::new(
        "a1",
        "10.0.0.5:7000",
        "0.1.0",
        serde_json::json!({"os": "linux", "cpus": 8}),
        42,
    );
    let json = serde_json::to_string(&record).unwrap();
    let parsed: AgentRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, record);
}

#[test]
fn status_display() {
    assert_eq!(AgentStatus::Active.to_string(), "active");
    assert_eq!(AgentStatus::Inactive.to_string(), "inactive");
    assert_eq!(AgentStatus::Unknown.to_string(), "unknown");
}
