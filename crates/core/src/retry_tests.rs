// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn fixed_policy_is_constant() {
    let base = Duration::from_secs(2);
    for attempt in 0..5 {
        assert_eq!(retry_delay(RetryPolicy::Fixed, base, attempt), base);
    }
}

#[yare::parameterized(
    first  = { 0, 1 },
    second = { 1, 2 },
    third  = { 2, 4 },
    fourth = { 3, 8 },
)]
fn exponential_policy_doubles(attempt: u32, factor: u64) {
    let base = Duration::from_secs(1);
    assert_eq!(
        retry_delay(RetryPolicy::Exponential, base, attempt),
        Duration::from_secs(factor)
    );
}

#[test]
fn exponential_policy_saturates() {
    let d = retry_delay(RetryPolicy::Exponential, Duration::from_secs(1), 200);
    assert_eq!(d, Duration::MAX);
}

#[test]
fn jitter_stays_within_quarter() {
    let base = Duration::from_millis(1000);
    for entropy in [0u32, 17, 499, 500, 999, u32::MAX] {
        let jittered = apply_jitter(base, entropy);
        assert!(jittered >= Duration::from_millis(750), "{jittered:?}");
        assert!(jittered < Duration::from_millis(1250), "{jittered:?}");
    }
}

#[test]
fn jitter_leaves_tiny_delays_alone() {
    assert_eq!(apply_jitter(Duration::ZERO, 5), Duration::ZERO);
    assert_eq!(apply_jitter(Duration::from_millis(3), 5), Duration::from_millis(3));
}

#[test]
fn backoff_follows_the_law() {
    // After k consecutive failures the next delay is min(initial * mult^k, max).
    let mut backoff = Backoff::reconnect();
    let delays: Vec<u64> =
        (0..6).map(|_| backoff.next_delay().as_secs()).collect();
    assert_eq!(delays, vec![5, 10, 20, 40, 60, 60]);
}

#[test]
fn backoff_reset_restarts_sequence() {
    let mut backoff = Backoff::reconnect();
    backoff.next_delay();
    backoff.next_delay();
    assert_eq!(backoff.failures(), 2);

    backoff.reset();
    assert_eq!(backoff.failures(), 0);
    assert_eq!(backoff.next_delay(), Duration::from_secs(5));
}

#[test]
fn backoff_caps_at_max() {
    let mut backoff = Backoff::new(Duration::from_secs(3), Duration::from_secs(10), 4);
    assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    assert_eq!(backoff.next_delay(), Duration::from_secs(10));
    assert_eq!(backoff.next_delay(), Duration::from_secs(10));
}
