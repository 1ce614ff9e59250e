// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host facts reported at registration.

/// Collect system information as loose JSON: hostname, OS, architecture,
/// CPU count. Everything is best-effort; registration never fails over a
/// missing hostname.
pub fn collect_system_info() -> serde_json::Value {
    serde_json::json!({
        "hostname": hostname(),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpus": std::thread::available_parallelism().map(usize::from).unwrap_or(1),
    })
}

fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
#[path = "sysinfo_tests.rs"]
mod tests;
