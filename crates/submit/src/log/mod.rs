//! Per-submission activity log.
//!
//! The log is an append-only sequence of [`LogEntry`] records that documents
//! every outbound exchange and state change of a submission. Consecutive
//! repeats of the same entry (see [`LogEntry::is_repeat_of`]) are collapsed
//! into a single row whose `count` grows, so a long run of identical poll
//! results stays one line.
//!
//! When an entry is merged the newest entry replaces the stored one and
//! inherits `previous.count + 1`: the displayed timestamp advances while the
//! count accumulates.

mod entry;

pub use entry::{LogEntry, LogLevel, RecordOptions};

use serde::{Serialize, Serializer};

/// Ordered, merge-on-repeat sequence of log entries.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
}

impl ActivityLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message and returns the stored entry.
    pub fn record(&mut self, message: impl Into<String>, options: RecordOptions) -> &LogEntry {
        let mut entry = LogEntry::new(message, options);

        match self.entries.last_mut() {
            Some(last) if entry.is_repeat_of(last) => {
                entry.count = last.count + 1;
                *last = entry;
            }
            _ => self.entries.push(entry),
        }

        // Either branch leaves at least one entry in place.
        &self.entries[self.entries.len() - 1]
    }

    /// Returns the most recent entry.
    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    /// Returns all entries, oldest first.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Returns the number of stored rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ActivityLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
