// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry operations and the reachability sweep.

use sloth_core::{AgentRecord, AgentStatus, Clock, StoreEvent};
use sloth_storage::{Store, StoreError};
use sloth_wire::AgentInfo;
use std::sync::Arc;
use tracing::info;

/// Outcome of a resolution attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Address(String),
    NotFound,
    Inactive,
}

/// CRUD + heartbeat + name resolution over the agents table.
pub struct Registry<C: Clock> {
    store: Arc<Store>,
    clock: C,
}

impl<C: Clock> Registry<C> {
    pub fn new(store: Arc<Store>, clock: C) -> Self {
        Self { store, clock }
    }

    /// Upsert an agent record: active, fresh heartbeat. Idempotent for
    /// the same (name, address) apart from timestamps.
    pub fn register(
        &self,
        name: &str,
        address: &str,
        version: &str,
        system_info: serde_json::Value,
    ) -> Result<(), StoreError> {
        let record =
            AgentRecord::new(name, address, version, system_info, self.clock.epoch_ms());
        info!(agent = %name, address = %address, "agent registered");
        self.store.commit_one(StoreEvent::AgentRegistered { record })
    }

    /// Record a heartbeat. Returns false when the agent is unknown, so
    /// the caller can tell it to re-register.
    pub fn heartbeat(&self, name: &str) -> Result<bool, StoreError> {
        let known = self.store.read(|s| s.agents.contains_key(name));
        if !known {
            return Ok(false);
        }
        self.store.commit_one(StoreEvent::AgentHeartbeat {
            name: name.to_string(),
            at_ms: self.clock.epoch_ms(),
        })?;
        Ok(true)
    }

    /// Current address of an agent. Inactive agents resolve to
    /// [`Resolution::Inactive`]: they may not receive new delegations.
    pub fn resolve(&self, name: &str) -> Resolution {
        self.store.read(|s| match s.agents.get(name) {
            None => Resolution::NotFound,
            Some(agent) if !agent.accepts_work() => Resolution::Inactive,
            Some(agent) => Resolution::Address(agent.address.clone()),
        })
    }

    /// Enumerate agents, optionally filtered by status, sorted by name.
    pub fn list(&self, status: Option<AgentStatus>) -> Vec<AgentInfo> {
        let mut agents = self.store.read(|s| {
            s.agents
                .values()
                .filter(|a| status.is_none_or(|wanted| a.status == wanted))
                .map(|a| AgentInfo {
                    name: a.name.clone(),
                    address: a.address.clone(),
                    status: a.status.to_string(),
                    last_heartbeat_ms: a.last_heartbeat_ms,
                    last_info_collected_ms: a.last_info_collected_ms,
                    version: a.version.clone(),
                    system_info: a.system_info.clone(),
                })
                .collect::<Vec<_>>()
        });
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }

    /// Mark an agent inactive (idempotent).
    pub fn mark_inactive(&self, name: &str, reason: &str) -> Result<(), StoreError> {
        self.store.commit_one(StoreEvent::AgentMarkedInactive {
            name: name.to_string(),
            reason: reason.to_string(),
            at_ms: self.clock.epoch_ms(),
        })
    }

    /// Delete an agent record. Returns false when nothing was there.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let existed = self.store.read(|s| s.agents.contains_key(name));
        if existed {
            self.store.commit_one(StoreEvent::AgentRemoved { name: name.to_string() })?;
        }
        Ok(existed)
    }

    /// Reachability sweep: flip agents with stale heartbeats to inactive.
    /// Returns the names flipped this pass.
    pub fn sweep(&self) -> Result<Vec<String>, StoreError> {
        let now_ms = self.clock.epoch_ms();
        let stale: Vec<String> = self.store.read(|s| {
            s.agents
                .values()
                .filter(|a| a.status == AgentStatus::Active && a.is_stale(now_ms))
                .map(|a| a.name.clone())
                .collect()
        });

        for name in &stale {
            info!(agent = %name, "marking stale agent inactive");
            self.store.commit_one(StoreEvent::AgentMarkedInactive {
                name: name.clone(),
                reason: "missed heartbeats".to_string(),
                at_ms: now_ms,
            })?;
        }
        Ok(stale)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
