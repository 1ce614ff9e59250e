// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection supervisor: registration, heartbeats, reconnection.
//!
//! Drives the agent's connection state machine. Registration failures and
//! lost heartbeats feed the exponential back-off; a successful
//! registration resets it. The loop is fully interruptible by the
//! shutdown token and owns no sockets across iterations.

use crate::client::MasterClient;
use crate::sysinfo::collect_system_info;
use sloth_core::retry::{Backoff, HEARTBEAT_FAILURE_THRESHOLD, HEARTBEAT_INTERVAL};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where the agent stands with its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Registered,
    Active,
    Reconnecting,
    Shutdown,
}

sloth_core::simple_display! {
    ConnectionState {
        Disconnected => "disconnected",
        Connecting => "connecting",
        Registered => "registered",
        Active => "active",
        Reconnecting => "reconnecting",
        Shutdown => "shutdown",
    }
}

/// Why the heartbeat loop ended.
enum HeartbeatEnd {
    Shutdown,
    /// Threshold of consecutive failures: the connection is lost.
    Lost,
    /// The master answered `unknown_agent`: re-register immediately.
    Reregister,
}

/// Registration and heartbeat driver.
pub struct Supervisor {
    client: MasterClient,
    name: String,
    advertised_address: String,
    state: ConnectionState,
    backoff: Backoff,
    heartbeat_interval: Duration,
    failure_threshold: u32,
}

impl Supervisor {
    pub fn new(
        client: MasterClient,
        name: impl Into<String>,
        advertised_address: impl Into<String>,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            advertised_address: advertised_address.into(),
            state: ConnectionState::Disconnected,
            backoff: Backoff::reconnect(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            failure_threshold: HEARTBEAT_FAILURE_THRESHOLD,
        }
    }

    /// Override timing (tests use short intervals).
    pub fn with_timing(mut self, backoff: Backoff, heartbeat_interval: Duration) -> Self {
        self.backoff = backoff;
        self.heartbeat_interval = heartbeat_interval;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drive the state machine until the shutdown token fires.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            if shutdown.is_cancelled() {
                self.state = ConnectionState::Shutdown;
                return;
            }

            self.state = ConnectionState::Connecting;
            match self
                .client
                .register(&self.name, &self.advertised_address, collect_system_info())
                .await
            {
                Ok(()) => {
                    self.state = ConnectionState::Registered;
                    self.backoff.reset();
                    info!(
                        agent = %self.name,
                        address = %self.advertised_address,
                        "registered with master"
                    );
                }
                Err(e) => {
                    warn!(agent = %self.name, error = %e, "registration failed");
                    if !self.sleep_before_reconnect(&shutdown).await {
                        return;
                    }
                    continue;
                }
            }

            // Heartbeat until the connection is declared lost or the
            // master forgets us.
            match self.heartbeat_loop(&shutdown).await {
                HeartbeatEnd::Shutdown => return,
                // Master restarted or we were deleted: the record is gone,
                // not the network. Re-register without backing off.
                HeartbeatEnd::Reregister => continue,
                HeartbeatEnd::Lost => {
                    if !self.sleep_before_reconnect(&shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    /// Heartbeat until failure threshold or unknown-agent.
    async fn heartbeat_loop(&mut self, shutdown: &CancellationToken) -> HeartbeatEnd {
        let mut consecutive_failures = 0u32;
        let mut interval = tokio::time::interval(self.heartbeat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick is immediate; skip it, registration just happened.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.cancelled() => {
                    self.state = ConnectionState::Shutdown;
                    return HeartbeatEnd::Shutdown;
                }
            }

            match self.client.heartbeat(&self.name).await {
                Ok(()) => {
                    consecutive_failures = 0;
                    self.state = ConnectionState::Active;
                }
                Err(e) if e.is_unknown_agent() => {
                    warn!(agent = %self.name, "master does not know us, re-registering");
                    self.state = ConnectionState::Disconnected;
                    self.backoff.reset();
                    return HeartbeatEnd::Reregister;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    warn!(
                        agent = %self.name,
                        consecutive_failures,
                        error = %e,
                        "heartbeat failed"
                    );
                    if consecutive_failures >= self.failure_threshold {
                        self.state = ConnectionState::Disconnected;
                        return HeartbeatEnd::Lost;
                    }
                }
            }
        }
    }

    /// Back-off sleep, interruptible. Returns false when shutdown fired.
    async fn sleep_before_reconnect(&mut self, shutdown: &CancellationToken) -> bool {
        self.state = ConnectionState::Reconnecting;
        let delay = self.backoff.next_delay();
        info!(agent = %self.name, delay_s = delay.as_secs(), "reconnecting after back-off");
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.cancelled() => {
                self.state = ConnectionState::Shutdown;
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
