// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

#[test]
fn replaces_known_placeholders() {
    let result = interpolate(
        "deploy --region {params.region} --tag {params.tag}",
        &params(&[("region", "eu"), ("tag", "v2")]),
        "test",
    );
    assert_eq!(result.unwrap(), "deploy --region eu --tag v2");
}

#[test]
fn text_without_placeholders_is_untouched_even_with_no_params() {
    let result = interpolate("echo plain", &BTreeMap::new(), "test");
    assert_eq!(result.unwrap(), "echo plain");
}

#[test]
fn unknown_placeholder_is_an_error_with_location() {
    let err = interpolate("echo {params.missing}", &BTreeMap::new(), "task \"x\" command")
        .unwrap_err();
    assert_eq!(
        err,
        TemplateError::UnknownParameter {
            name: "missing".to_string(),
            location: "task \"x\" command".to_string(),
        }
    );
}

#[test]
fn repeated_placeholder_replaces_every_occurrence() {
    let result =
        interpolate("{params.x}-{params.x}", &params(&[("x", "a")]), "test").unwrap();
    assert_eq!(result, "a-a");
}

#[test]
fn non_param_braces_are_left_alone() {
    let result = interpolate("awk '{print $1}'", &BTreeMap::new(), "test").unwrap();
    assert_eq!(result, "awk '{print $1}'");
}
