//! Action Log
//!
//! A bounded trail of the most recently dispatched actions, kept for display
//! and debugging. Entries are appended by the store after a transition has
//! been decided; nothing in the log is ever read back by a reducer.

use std::collections::VecDeque;
use std::time::SystemTime;

use serde::Serialize;

/// Default number of entries retained by a store's action log.
pub const DEFAULT_LOG_CAPACITY: usize = 5;

/// What a dispatch did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogOutcome {
    /// A new snapshot was committed.
    Applied,
    /// The reducer returned the current snapshot.
    Unchanged,
    /// The reducer refused the action; state is untouched.
    Rejected,
}

/// One dispatched action as seen by the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionLogEntry {
    /// Sequence number, unique within the owning log.
    pub id: u64,
    pub kind: String,
    pub payload: Option<serde_json::Value>,
    pub timestamp: SystemTime,
    pub outcome: LogOutcome,
}

/// FIFO buffer that evicts its oldest entry once full.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    capacity: usize,
    next_id: u64,
}

impl ActionLog {
    /// Create a log holding at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_id: 1,
        }
    }

    /// Append an entry, evicting the oldest if the log is full.
    ///
    /// Returns the entry's sequence number.
    pub fn record(
        &mut self,
        kind: impl Into<String>,
        payload: Option<serde_json::Value>,
        outcome: LogOutcome,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ActionLogEntry {
            id,
            kind: kind.into(),
            payload,
            timestamp: SystemTime::now(),
            outcome,
        });
        id
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> Vec<ActionLogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&ActionLogEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}
