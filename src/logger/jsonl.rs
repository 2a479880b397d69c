//! JSONL activity log: append-only line-delimited JSON, one object per batch event.
//!
//! Lines are assembled in memory and written with a single `write_all` so a
//! tailing reader never sees a partial line.
//!
//! Degradation chain:
//! 1. Configured file path
//! 2. stderr with `[PCOV-JSONL]` prefix
//! 3. Silent discard (a coverage run never fails because of logging)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{PcovError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Batch lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BatchStart,
    RunParsed,
    RunExcluded,
    ReportWritten,
    Cleanup,
    BatchComplete,
    Error,
}

/// A single JSONL log entry; all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Run label (archive or dump path).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    /// File written or removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Number of runs involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs: Option<usize>,
    /// Distinct parameters involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub covered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_covered: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// PCOV error code if the step failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            run: None,
            path: None,
            runs: None,
            params: None,
            covered: None,
            not_covered: None,
            coverage_pct: None,
            duration_ms: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    /// Entry describing a failure.
    pub fn error(err: &PcovError) -> Self {
        let mut entry = Self::new(EventType::Error, Severity::Critical);
        entry.ok = Some(false);
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry
    }

    #[must_use]
    pub fn with_run(mut self, label: impl Into<String>) -> Self {
        self.run = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    File,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open (or create) the log file; degrades to stderr when that fails.
    pub fn open(path: &Path) -> Self {
        let mut w = Self {
            path: Some(path.to_path_buf()),
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        };
        match open_append(path) {
            Ok(file) => {
                w.writer = Some(BufWriter::new(file));
                w.state = WriterState::File;
            }
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[PCOV-JSONL] cannot open {}, using stderr: {e}",
                    path.display()
                );
                w.state = WriterState::Stderr;
            }
        }
        w
    }

    /// A writer that drops every entry.
    pub fn discard() -> Self {
        Self {
            path: None,
            writer: None,
            state: WriterState::Discard,
            lines_written: 0,
        }
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        if self.state == WriterState::Discard {
            return;
        }
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[PCOV-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::File => "file",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::File => {
                let written = self
                    .writer
                    .as_mut()
                    .is_some_and(|w| w.write_all(line.as_bytes()).is_ok());
                if written {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[PCOV-JSONL] {line}").is_ok() {
                    self.lines_written += 1;
                } else {
                    self.degrade();
                }
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::File => {
                let _ = writeln!(io::stderr(), "[PCOV-JSONL] log write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Open or create a file for appending, creating its parent directory.
fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PcovError::io(parent, source))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PcovError::io(path, source))
}

fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
