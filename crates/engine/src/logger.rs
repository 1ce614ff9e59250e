// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task output logging.
//!
//! Each task gets one logger for the lifetime of a run. Output lines go to
//! the run's log file and the recent stderr tail is kept in memory so a
//! failing task's report can show what it printed. Multi-host execution
//! tags each host's lines with the agent name.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Stderr lines kept for failure reports.
const TAIL_LINES: usize = 20;

struct LoggerInner {
    file: Mutex<Option<File>>,
    stderr_tail: Mutex<VecDeque<String>>,
}

/// Cloneable log sink for one task's output.
#[derive(Clone)]
pub struct TaskLogger {
    task: String,
    tag: Option<String>,
    inner: Arc<LoggerInner>,
}

impl TaskLogger {
    /// Create a logger appending to `log_path` (best-effort: an unwritable
    /// log never fails a task).
    pub fn new(task: impl Into<String>, log_path: Option<&Path>) -> Self {
        let file = log_path.and_then(|path| {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            OpenOptions::new().create(true).append(true).open(path).ok()
        });
        Self {
            task: task.into(),
            tag: None,
            inner: Arc::new(LoggerInner {
                file: Mutex::new(file),
                stderr_tail: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// A logger writing to nowhere but still collecting the stderr tail.
    pub fn discard(task: impl Into<String>) -> Self {
        Self::new(task, None)
    }

    /// Same sink, lines prefixed with an agent tag.
    pub fn with_tag(&self, tag: impl Into<String>) -> Self {
        Self { task: self.task.clone(), tag: Some(tag.into()), inner: Arc::clone(&self.inner) }
    }

    pub fn stdout(&self, line: &str) {
        self.write("out", line);
    }

    pub fn stderr(&self, line: &str) {
        {
            let mut tail = self.inner.stderr_tail.lock();
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
        self.write("err", line);
    }

    /// Recent stderr lines, oldest first.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.inner.stderr_tail.lock().iter().cloned().collect()
    }

    fn write(&self, stream: &str, line: &str) {
        let prefix = match &self.tag {
            Some(tag) => format!("[{}][{}]", self.task, tag),
            None => format!("[{}]", self.task),
        };
        tracing::debug!(task = %self.task, stream, "{}", line);
        if let Some(file) = self.inner.file.lock().as_mut() {
            let _ = writeln!(file, "{prefix} {stream}: {line}");
        }
    }
}

#[cfg(test)]
#[path = "logger_tests.rs"]
mod tests;
