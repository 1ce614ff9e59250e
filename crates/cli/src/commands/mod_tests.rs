// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    plain       = { "region=eu", "region", "eu" },
    empty_value = { "tag=", "tag", "" },
    equals_in_value = { "expr=a=b", "expr", "a=b" },
)]
fn key_value_pairs(raw: &str, key: &str, value: &str) {
    assert_eq!(parse_key_value(raw), Ok((key.to_string(), value.to_string())));
}

#[yare::parameterized(
    no_equals = { "region" },
    empty_key = { "=eu" },
)]
fn bad_key_value_pairs(raw: &str) {
    assert!(parse_key_value(raw).is_err());
}

#[test]
fn confirm_with_yes_skips_the_prompt() {
    assert!(confirm("Proceed?", true).is_ok());
}
