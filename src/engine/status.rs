// src/engine/status.rs

//! Bounded run log and status snapshots.

use std::collections::{BTreeMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Number of log entries included in a status snapshot.
pub const STATUS_LOG_TAIL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub level: Severity,
    pub message: String,
}

/// In-memory log keeping the most recent `capacity` entries.
///
/// Every entry is mirrored to `tracing` as it is recorded.
#[derive(Debug, Clone)]
pub struct RunLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl RunLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, level: Severity, message: impl Into<String>) {
        let message = message.into();
        match level {
            Severity::Debug => debug!(target: "flowloop::engine", "{message}"),
            Severity::Info => info!(target: "flowloop::engine", "{message}"),
            Severity::Warn => warn!(target: "flowloop::engine", "{message}"),
            Severity::Error => error!(target: "flowloop::engine", "{message}"),
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            timestamp: now_seconds(),
            level,
            message,
        });
    }

    /// Up to `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Point-in-time view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub running: bool,
    pub has_workflow: bool,
    pub iteration_count: u64,
    pub last_duration_seconds: f64,
    pub interval_seconds: f64,
    pub last_results: BTreeMap<String, Value>,
    pub recent_logs: Vec<LogEntry>,
    pub plan_ready: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_drops_oldest_entries() {
        let mut log = RunLog::new(3);
        for i in 0..5 {
            log.record(Severity::Info, format!("entry {i}"));
        }
        assert_eq!(log.len(), 3);

        let recent = log.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "entry 3");
        assert_eq!(recent[1].message, "entry 4");
        assert_eq!(log.recent(10)[0].message, "entry 2");
    }

    #[test]
    fn status_serializes_camel_case() {
        let status = EngineStatus {
            running: false,
            has_workflow: true,
            iteration_count: 4,
            last_duration_seconds: 0.25,
            interval_seconds: 1.0,
            last_results: BTreeMap::new(),
            recent_logs: Vec::new(),
            plan_ready: true,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["hasWorkflow"], true);
        assert_eq!(value["iterationCount"], 4);
        assert_eq!(value["planReady"], true);
    }
}
