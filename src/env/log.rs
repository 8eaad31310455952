//! User-facing diagnostic log collected during a run.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, warn};

/// Severity of a diagnostic entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Progress information.
    Info,
    /// Something was skipped or looks suspicious; the run continues.
    Warn,
    /// The run stopped.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
        })
    }
}

/// One diagnostic message.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct LogEntry {
    /// Entry severity.
    pub severity: Severity,
    /// Human-readable message.
    pub message: String,
}

/// Append-only list of diagnostics. Every entry is also emitted as a
/// `tracing` event at the matching level.
#[derive(Clone, Debug, Default)]
pub struct DiagnosticLog {
    entries: Vec<LogEntry>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => info!(%message, "diagnostic"),
            Severity::Warn => warn!(%message, "diagnostic"),
            Severity::Error => error!(%message, "diagnostic"),
        }
        self.entries.push(LogEntry { severity, message });
    }

    /// Appends an `Info` entry.
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    /// Appends a `Warn` entry.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Severity::Warn, message);
    }

    /// Appends an `Error` entry.
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries of one severity.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &LogEntry> + '_ {
        self.entries.iter().filter(move |e| e.severity == severity)
    }
}
