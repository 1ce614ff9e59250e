// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn map(keys: &[&str]) -> HashMap<String, u32> {
    keys.iter().enumerate().map(|(i, k)| (k.to_string(), i as u32)).collect()
}

#[test]
fn exact_match_wins() {
    let m = map(&["stk-abc", "stk-abcdef"]);
    assert_eq!(find_by_prefix(&m, "stk-abc"), Some(&0));
}

#[test]
fn unique_prefix_matches() {
    let m = map(&["stk-abc", "stk-xyz"]);
    assert_eq!(find_by_prefix(&m, "stk-x"), Some(&1));
}

#[test]
fn ambiguous_prefix_is_none() {
    let m = map(&["stk-abc", "stk-abd"]);
    assert_eq!(find_by_prefix(&m, "stk-ab"), None);
}

#[test]
fn empty_key_is_none() {
    let m = map(&["stk-abc"]);
    assert_eq!(find_by_prefix(&m, ""), None);
}
