// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the master.

use std::path::PathBuf;
use std::time::Duration;

/// Default master listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:50051";

/// Resolve the data directory: SLOTH_DATA_DIR > /etc/sloth (if writable) >
/// $HOME/.sloth.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("SLOTH_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }
    let etc = PathBuf::from("/etc/sloth");
    if dir_writable(&etc) {
        return Some(etc);
    }
    dirs::home_dir().map(|home| home.join(".sloth"))
}

/// A directory counts as writable if it exists writable or can be created.
fn dir_writable(dir: &std::path::Path) -> bool {
    if dir.is_dir() {
        let probe = dir.join(".sloth-probe");
        let ok = std::fs::write(&probe, b"").is_ok();
        let _ = std::fs::remove_file(&probe);
        return ok;
    }
    std::fs::create_dir_all(dir).is_ok()
}

/// Listen address: SLOTH_MASTER_ADDR or the default.
pub fn listen_addr() -> String {
    std::env::var("SLOTH_MASTER_ADDR").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
}

/// Auth token demanded from TCP clients, when set.
pub fn auth_token() -> Option<String> {
    std::env::var("SLOTH_AUTH_TOKEN").ok().filter(|t| !t.is_empty())
}

/// Reachability sweep interval override (tests), default 30 s.
pub fn sweep_interval() -> Duration {
    std::env::var("SLOTH_SWEEP_INTERVAL_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(30))
}

/// Hook queue drain interval override (tests), default 5 s.
pub fn hook_drain_interval() -> Duration {
    std::env::var("SLOTH_HOOK_DRAIN_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
