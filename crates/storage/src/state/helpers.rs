// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for state lookups.

use std::collections::HashMap;

/// Find a value by exact key or unique key prefix.
///
/// Returns `None` when the prefix is ambiguous; callers treat that the
/// same as not found and ask the user for more characters.
pub fn find_by_prefix<'a, V>(map: &'a HashMap<String, V>, key: &str) -> Option<&'a V> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    if key.is_empty() {
        return None;
    }

    let mut matches = map.iter().filter(|(k, _)| k.starts_with(key));
    let first = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    Some(first.1)
}

#[cfg(test)]
#[path = "helpers_tests.rs"]
mod tests;
