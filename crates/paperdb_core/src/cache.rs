//! In-memory record cache.
//!
//! Maps collection names to their decoded record lists. Invalidation is
//! coarse: when the configured interval has elapsed since the last clear, the
//! entire cache is dropped and the clear is stamped. There is no per-record
//! TTL.
//!
//! The sweep runs independent of the per-collection locks and may race an
//! in-flight load or save of the same collection. This is accepted: both
//! sides only ever replace whole `Arc`'d lists, never partially mutate them.

use crate::clock::TimestampMs;
use crate::record::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Cache of decoded record lists, keyed by collection name.
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: RwLock<HashMap<String, Arc<Vec<Record>>>>,
}

impl RecordCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached records for a collection, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Vec<Record>>> {
        self.entries.read().get(name).cloned()
    }

    /// Replaces the cached records for a collection.
    pub fn put(&self, name: impl Into<String>, records: Arc<Vec<Record>>) {
        self.entries.write().insert(name.into(), records);
    }

    /// Clears one entry, or all entries when `name` is `None`.
    pub fn invalidate(&self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.entries.write().remove(name);
            }
            None => self.entries.write().clear(),
        }
    }

    /// Clears everything if the invalidation interval has elapsed.
    ///
    /// Returns `true` when a clear happened; the caller stamps `last_clear`
    /// in the catalog.
    pub fn sweep_if_due(
        &self,
        now: TimestampMs,
        last_clear: TimestampMs,
        interval_seconds: u64,
    ) -> bool {
        let interval_ms = interval_seconds.saturating_mul(1000);
        if now.saturating_sub(last_clear) <= interval_ms {
            return false;
        }

        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        drop(entries);

        tracing::debug!(cleared = count, "cache sweep cleared all collections");
        true
    }

    /// Number of cached collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
