//! Human-readable execution log
//!
//! Append-only; cleared only when a session resets or a new one starts.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub message: String,
    pub severity: Severity,
    /// Milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

#[derive(Clone, Debug, Default)]
pub struct ExecutionLog {
    entries: Vec<LogEntry>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        self.entries.push(LogEntry {
            message: message.into(),
            severity,
            timestamp_ms: now_ms(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(Severity::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries appended after the first `from`
    pub fn since(&self, from: usize) -> &[LogEntry] {
        self.entries.get(from..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_in_order() {
        let mut log = ExecutionLog::new();
        log.info("first");
        log.success("second");
        log.error("third");

        let severities: Vec<Severity> = log.entries().iter().map(|e| e.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Info, Severity::Success, Severity::Error]
        );
        assert_eq!(log.entries()[1].message, "second");
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut log = ExecutionLog::new();
        for i in 0..10 {
            log.info(format!("step {}", i));
        }
        let stamps: Vec<u64> = log.entries().iter().map(|e| e.timestamp_ms).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_since() {
        let mut log = ExecutionLog::new();
        log.info("a");
        log.info("b");
        log.info("c");

        assert_eq!(log.since(1).len(), 2);
        assert!(log.since(3).is_empty());
        assert!(log.since(10).is_empty());
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Success).unwrap(), "\"success\"");
    }
}
