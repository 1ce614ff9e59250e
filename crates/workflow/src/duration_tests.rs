// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    millis  = { "500ms", 0, 500_000_000 },
    seconds = { "90s", 90, 0 },
    minutes = { "5m", 300, 0 },
    hours   = { "2h", 7200, 0 },
    padded  = { " 10s ", 10, 0 },
)]
fn valid_durations(input: &str, secs: u64, nanos: u32) {
    assert_eq!(parse_duration(input), Ok(Duration::new(secs, nanos)));
}

#[yare::parameterized(
    empty        = { "" },
    no_unit      = { "90" },
    no_number    = { "s" },
    unknown_unit = { "5d" },
    negative     = { "-5s" },
    float        = { "1.5h" },
)]
fn invalid_durations(input: &str) {
    assert!(matches!(parse_duration(input), Err(DurationError::Invalid(_))));
}

#[yare::parameterized(
    zero_s  = { "0s" },
    zero_ms = { "0ms" },
)]
fn zero_durations_are_rejected(input: &str) {
    assert!(matches!(parse_duration(input), Err(DurationError::Zero(_))));
}
