// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook subsystem types.
//!
//! Task and workflow lifecycle transitions enqueue [`HookEvent`] rows; the
//! master drains the queue and dispatches matching registered hooks. Only
//! the queue and its status machine live here; dispatch policy is the
//! master's concern.

use crate::EventId;
use serde::{Deserialize, Serialize};

/// Processing status of a queued hook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEventStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

crate::simple_display! {
    HookEventStatus {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// A queued lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub id: EventId,
    /// Dotted event type, e.g. `task.failed` or `workflow.completed`.
    pub event_type: String,
    /// Event payload as loose JSON; hooks receive it on stdin.
    pub payload: serde_json::Value,
    pub status: HookEventStatus,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HookEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value, now_ms: u64) -> Self {
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            payload,
            status: HookEventStatus::Pending,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
            error: None,
        }
    }
}

/// A registered hook: a shell command subscribed to event types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDef {
    /// Unique hook name.
    pub name: String,
    /// Event types this hook fires on. `*` subscribes to everything.
    pub events: Vec<String>,
    /// Shell command run with the event payload on stdin.
    pub command: String,
}

impl HookDef {
    /// Does this hook subscribe to the given event type?
    pub fn matches(&self, event_type: &str) -> bool {
        self.events.iter().any(|e| e == "*" || e == event_type)
    }
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
