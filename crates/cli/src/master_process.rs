// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-start of the local master daemon.
//!
//! The `slothd` binary is expected next to the `sloth` executable. It
//! prints READY on stdout once it accepts connections.

use crate::exit_error::ExitError;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long to wait for the daemon's READY line.
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Start `slothd` if possible. Returns false when the binary is missing
/// (the caller reports the original connection error instead).
pub fn try_start() -> Result<bool, ExitError> {
    let Some(binary) = find_slothd() else {
        return Ok(false);
    };

    eprintln!("starting slothd...");
    let mut child = Command::new(&binary)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            ExitError::failure(format!("failed to start {}: {e}", binary.display()))
        })?;

    // Wait for READY (or early exit) within the startup budget.
    let Some(stdout) = child.stdout.take() else {
        return Err(ExitError::failure("slothd gave no stdout"));
    };
    let started = Instant::now();
    let mut lines = BufReader::new(stdout).lines();
    loop {
        if started.elapsed() > START_TIMEOUT {
            return Err(ExitError::failure("slothd did not become ready in time"));
        }
        match lines.next() {
            Some(Ok(line)) if line.trim() == "READY" => return Ok(true),
            Some(Ok(_)) => continue,
            // stdout closed: either an already-running daemon made ours
            // exit, or startup failed. Let the retry decide.
            _ => return Ok(true),
        }
    }
}

/// Locate slothd next to the current executable, falling back to PATH.
fn find_slothd() -> Option<std::path::PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("slothd");
            if sibling.is_file() {
                return Some(sibling);
            }
        }
    }
    // PATH lookup, resolved by the OS at spawn time.
    Some(std::path::PathBuf::from("slothd"))
}
