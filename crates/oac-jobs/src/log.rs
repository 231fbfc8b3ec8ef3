//! Job log.

#![allow(missing_docs)]

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use oac_engine::{LogEntry, Severity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLogEntry {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub message: String,
}

impl JobLogEntry {
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            severity,
            message: message.into(),
        }
    }

    /// Milliseconds since the Unix epoch; 0 for clocks set before it.
    #[must_use]
    pub fn unix_millis(&self) -> u128 {
        self.timestamp
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis()
    }
}

impl From<LogEntry> for JobLogEntry {
    fn from(entry: LogEntry) -> Self {
        Self::new(entry.severity, entry.message)
    }
}

impl fmt::Display for JobLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Entries in arrival order.
#[derive(Debug, Clone, Default)]
pub struct JobLog {
    entries: Vec<JobLogEntry>,
}

impl JobLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: impl Into<JobLogEntry>) {
        self.entries.push(entry.into());
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn entries(&self) -> &[JobLogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries at `severity` or more severe.
    pub fn at_least(&self, severity: Severity) -> impl Iterator<Item = &JobLogEntry> + '_ {
        self.entries
            .iter()
            .filter(move |entry| entry.severity <= severity)
    }
}
