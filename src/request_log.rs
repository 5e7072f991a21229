//! Bounded in-memory request log.
//!
//! Entries get sequential IDs starting at 1. Once the store is over
//! capacity the oldest entries are dropped without notice; readers holding
//! an old ID must not assume it is still present.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// Default number of entries kept in memory.
pub const DEFAULT_MAX_LOGS: usize = 1000;

/// Single-valued header map as recorded in logs.
pub type LoggedHeaders = BTreeMap<String, String>;

/// Recorded summary of one request/response cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub request_headers: LoggedHeaders,
    pub request_body: String,
    pub response_headers: LoggedHeaders,
    pub response_body: String,
    pub status_code: u16,
    /// Serialized as integer nanoseconds.
    #[serde(with = "duration_nanos")]
    pub duration: Duration,
}

/// Entry fields supplied by the caller; the store assigns the ID.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub request_headers: LoggedHeaders,
    pub request_body: String,
    pub response_headers: LoggedHeaders,
    pub response_body: String,
    pub status_code: u16,
    pub duration: Duration,
}

impl NewLogEntry {
    fn into_entry(self, id: u64) -> RequestLogEntry {
        RequestLogEntry {
            id,
            timestamp: self.timestamp,
            method: self.method,
            path: self.path,
            request_headers: self.request_headers,
            request_body: self.request_body,
            response_headers: self.response_headers,
            response_body: self.response_body,
            status_code: self.status_code,
            duration: self.duration,
        }
    }
}

#[derive(Debug, Default)]
struct LogState {
    entries: VecDeque<RequestLogEntry>,
    last_id: u64,
}

/// Append-only, capacity-bounded log store.
#[derive(Debug)]
pub struct RequestLogStore {
    state: RwLock<LogState>,
    max_logs: usize,
}

impl Default for RequestLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestLogStore {
    /// Create a store holding up to [`DEFAULT_MAX_LOGS`] entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_LOGS)
    }

    /// Create a store holding up to `max_logs` entries (at least one).
    pub fn with_capacity(max_logs: usize) -> Self {
        let max_logs = max_logs.max(1);
        Self {
            state: RwLock::new(LogState {
                entries: VecDeque::with_capacity(max_logs.min(DEFAULT_MAX_LOGS)),
                last_id: 0,
            }),
            max_logs,
        }
    }

    /// Append an entry and return its assigned ID.
    pub fn append(&self, entry: NewLogEntry) -> u64 {
        let mut state = self.state.write();
        state.last_id += 1;
        let id = state.last_id;
        state.entries.push_back(entry.into_entry(id));
        while state.entries.len() > self.max_logs {
            state.entries.pop_front();
        }
        id
    }

    /// Snapshot of all entries, newest first.
    pub fn list(&self) -> Vec<RequestLogEntry> {
        let state = self.state.read();
        state.entries.iter().rev().cloned().collect()
    }

    /// Drop all entries and restart IDs at 1.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.entries.clear();
        state.last_id = 0;
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Maximum number of entries retained.
    pub fn capacity(&self) -> usize {
        self.max_logs
    }
}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
