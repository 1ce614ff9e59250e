// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry and reconnection back-off.
//!
//! One calculator serves both sides: task retries on the master (fixed or
//! exponential delay between attempts) and the agent's reconnect loop
//! (exponential delay capped at a maximum, reset on success).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default initial reconnect delay.
pub const RECONNECT_INITIAL: Duration = Duration::from_secs(5);

/// Default maximum reconnect delay.
pub const RECONNECT_MAX: Duration = Duration::from_secs(60);

/// Default reconnect delay multiplier.
pub const RECONNECT_MULTIPLIER: u32 = 2;

/// Default heartbeat interval.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Consecutive heartbeat failures before the connection is declared lost.
pub const HEARTBEAT_FAILURE_THRESHOLD: u32 = 3;

/// Default dial timeout for the initial master connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Grace period given to in-flight work on shutdown or cancellation before
/// the subprocess is killed.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Retry delay policy for a failing task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    #[default]
    Fixed,
    Exponential,
}

crate::simple_display! {
    RetryPolicy {
        Fixed => "fixed",
        Exponential => "exponential",
    }
}

/// Delay before retry attempt `attempt` (0-based: the delay slept after the
/// first failure is `retry_delay(policy, base, 0)`).
///
/// Fixed policy sleeps the base delay every time; exponential doubles it
/// per attempt. Callers that want jitter layer it on top with
/// [`apply_jitter`].
pub fn retry_delay(policy: RetryPolicy, base: Duration, attempt: u32) -> Duration {
    match policy {
        RetryPolicy::Fixed => base,
        RetryPolicy::Exponential => {
            let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
            base.checked_mul(factor).unwrap_or(Duration::MAX)
        }
    }
}

/// Spread a delay by up to ±25% using caller-provided entropy (typically
/// subsecond nanos from the clock). Deterministic given the same entropy,
/// which keeps tests exact.
pub fn apply_jitter(delay: Duration, entropy: u32) -> Duration {
    if delay.is_zero() {
        return delay;
    }
    let quarter = delay.as_millis() as u64 / 4;
    if quarter == 0 {
        return delay;
    }
    let offset = u64::from(entropy) % (quarter * 2);
    let base = delay.as_millis() as u64 - quarter;
    Duration::from_millis(base + offset)
}

/// Exponential back-off calculator.
///
/// After `k` consecutive failures the next delay is
/// `min(initial * multiplier^k, max)`. Success resets the sequence.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: u32,
    failures: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: u32) -> Self {
        Self { initial, max, multiplier, failures: 0 }
    }

    /// Back-off with the reconnect defaults (5s initial, x2, 60s cap).
    pub fn reconnect() -> Self {
        Self::new(RECONNECT_INITIAL, RECONNECT_MAX, RECONNECT_MULTIPLIER)
    }

    /// Delay to sleep before the next attempt, then advance the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let factor = self.multiplier.checked_pow(self.failures).unwrap_or(u32::MAX);
        let delay = self.initial.checked_mul(factor).unwrap_or(Duration::MAX).min(self.max);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    /// Reset after a successful attempt.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures recorded so far.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
