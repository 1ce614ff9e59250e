// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human duration strings: `"500ms"`, `"90s"`, `"5m"`, `"2h"`.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("invalid duration {0:?}: expected <number><ms|s|m|h>")]
    Invalid(String),
    #[error("duration must be positive: {0:?}")]
    Zero(String),
}

/// Parse a duration string. Zero durations are rejected; a timeout of zero
/// is a definition error, not "no timeout".
pub fn parse_duration(s: &str) -> Result<Duration, DurationError> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(split) if split > 0 => s.split_at(split),
        _ => return Err(DurationError::Invalid(s.to_string())),
    };

    let value: u64 = number.parse().map_err(|_| DurationError::Invalid(s.to_string()))?;

    let duration = match unit {
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        _ => return Err(DurationError::Invalid(s.to_string())),
    };

    if duration.is_zero() {
        return Err(DurationError::Zero(s.to_string()));
    }
    Ok(duration)
}

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;
