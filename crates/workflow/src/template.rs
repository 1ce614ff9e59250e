// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `{params.NAME}` interpolation for commands, env values, and hooks.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown parameter {name:?} in {location}")]
    UnknownParameter { name: String, location: String },
}

fn placeholder_re() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // static pattern, exercised by every test
        regex::Regex::new(r"\{params\.([A-Za-z_][A-Za-z0-9_]*)\}").unwrap()
    })
}

/// Replace every `{params.NAME}` with its value. An unknown name is a
/// definition error surfaced before execution.
pub fn interpolate(
    text: &str,
    params: &BTreeMap<String, String>,
    location: &str,
) -> Result<String, TemplateError> {
    let mut missing: Option<String> = None;
    let replaced = placeholder_re().replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match params.get(name) {
            Some(value) => value.clone(),
            None => {
                if missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });

    match missing {
        Some(name) => {
            Err(TemplateError::UnknownParameter { name, location: location.to_string() })
        }
        None => Ok(replaced.into_owned()),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
