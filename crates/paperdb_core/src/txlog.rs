//! Append-only transaction log.
//!
//! Every successful mutation appends one entry; a ring-buffer cap of 1000
//! entries is the only deletion path (oldest evicted first). The log lives
//! inside the catalog document and is persisted with it.

use crate::checksum::content_checksum;
use crate::clock::TimestampMs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use uuid::Uuid;

/// Maximum number of retained log entries.
pub const MAX_LOG_ENTRIES: usize = 1000;

/// The kind of mutation an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// A record was created.
    Create,
    /// A record was updated.
    Update,
    /// A record was deleted.
    Delete,
}

/// One audit entry in the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// When the mutation happened (ms since epoch).
    pub timestamp: TimestampMs,
    /// The kind of mutation.
    pub operation: Operation,
    /// The collection that was mutated.
    pub collection: String,
    /// Primary-key value of the affected record.
    pub record_id: Value,
    /// Optional label for who performed the mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    /// Full record for CREATE/DELETE, `{before, after}` for UPDATE.
    pub changes: Value,
    /// Checksum of the serialized `changes` payload.
    pub checksum: String,
}

impl LogEntry {
    /// Creates an entry, computing the change checksum.
    #[must_use]
    pub fn new(
        operation: Operation,
        collection: impl Into<String>,
        record_id: Value,
        changes: Value,
        actor: Option<String>,
        timestamp: TimestampMs,
    ) -> Self {
        let serialized = serde_json::to_vec(&changes).unwrap_or_default();
        Self {
            id: Uuid::new_v4(),
            timestamp,
            operation,
            collection: collection.into(),
            record_id,
            actor,
            changes,
            checksum: content_checksum(&serialized),
        }
    }
}

/// Filters for [`TransactionLog::query`].
///
/// Unset filters match everything; time bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Match only this operation.
    pub operation: Option<Operation>,
    /// Match only this collection.
    pub collection: Option<String>,
    /// Match only this actor.
    pub actor: Option<String>,
    /// Match entries at or after this time.
    pub since: Option<TimestampMs>,
    /// Match entries at or before this time.
    pub until: Option<TimestampMs>,
}

impl LogQuery {
    /// Creates an empty query matching every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters by operation.
    #[must_use]
    pub const fn operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Filters by collection name.
    #[must_use]
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Filters by actor label.
    #[must_use]
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Filters by inclusive lower time bound.
    #[must_use]
    pub const fn since(mut self, timestamp: TimestampMs) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Filters by inclusive upper time bound.
    #[must_use]
    pub const fn until(mut self, timestamp: TimestampMs) -> Self {
        self.until = Some(timestamp);
        self
    }

    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(operation) = self.operation {
            if entry.operation != operation {
                return false;
            }
        }
        if let Some(collection) = &self.collection {
            if &entry.collection != collection {
                return false;
            }
        }
        if let Some(actor) = &self.actor {
            if entry.actor.as_ref() != Some(actor) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        true
    }
}

/// The capped transaction log.
///
/// Insertion order is chronological; eviction happens only at the cap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLog {
    entries: VecDeque<LogEntry>,
}

impl TransactionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, evicting the oldest when the cap is exceeded.
    ///
    /// Returns the evicted entry if the cap forced one out.
    pub fn append(&mut self, entry: LogEntry) -> Option<LogEntry> {
        self.entries.push_back(entry);
        if self.entries.len() > MAX_LOG_ENTRIES {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Returns matching entries, newest first.
    #[must_use]
    pub fn query(&self, query: &LogQuery) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The oldest retained entry, if any.
    #[must_use]
    pub fn oldest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// The newest retained entry, if any.
    #[must_use]
    pub fn newest(&self) -> Option<&LogEntry> {
        self.entries.back()
    }
}
