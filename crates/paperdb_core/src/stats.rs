//! Store statistics.
//!
//! Operation counters are atomic and can be read while operations are in
//! progress; all are monotonically increasing. [`StatsSnapshot`] combines
//! them with a point-in-time summary of the catalog and cache.

use crate::clock::TimestampMs;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic operation counters.
#[derive(Debug, Default)]
pub struct StoreCounters {
    /// Collection loads served from disk.
    loads: AtomicU64,
    /// Collection loads served from cache.
    cache_hits: AtomicU64,
    /// Record creations.
    creates: AtomicU64,
    /// Record updates.
    updates: AtomicU64,
    /// Record deletions (triggering deletes only).
    deletes: AtomicU64,
    /// Records removed by relation cascades.
    cascade_removals: AtomicU64,
    /// Transaction-log entries evicted by the cap.
    log_evictions: AtomicU64,
    /// Full cache clears performed by the sweep.
    cache_sweeps: AtomicU64,
}

impl StoreCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_create(&self) {
        self.creates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cascade_removals(&self, count: u64) {
        self.cascade_removals.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_log_eviction(&self) {
        self.log_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_sweep(&self) {
        self.cache_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters at once.
    ///
    /// Individual loads are relaxed; the combination is approximate while
    /// operations are in flight.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            loads: self.loads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            creates: self.creates.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            cascade_removals: self.cascade_removals.load(Ordering::Relaxed),
            log_evictions: self.log_evictions.load(Ordering::Relaxed),
            cache_sweeps: self.cache_sweeps.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time statistics returned by `DocumentStore::stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Collection loads served from disk.
    pub loads: u64,
    /// Collection loads served from cache.
    pub cache_hits: u64,
    /// Record creations.
    pub creates: u64,
    /// Record updates.
    pub updates: u64,
    /// Record deletions.
    pub deletes: u64,
    /// Records removed by relation cascades.
    pub cascade_removals: u64,
    /// Transaction-log entries evicted by the cap.
    pub log_evictions: u64,
    /// Full cache clears performed by the sweep.
    pub cache_sweeps: u64,
    /// Record count per collection, as of the last save of each.
    pub record_counts: BTreeMap<String, usize>,
    /// Retained transaction-log entries.
    pub log_entries: usize,
    /// Collections currently cached.
    pub cached_collections: usize,
    /// When the cache was last fully cleared (ms since epoch).
    pub cache_last_clear: TimestampMs,
}

/// Counter values captured together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Collection loads served from disk.
    pub loads: u64,
    /// Collection loads served from cache.
    pub cache_hits: u64,
    /// Record creations.
    pub creates: u64,
    /// Record updates.
    pub updates: u64,
    /// Record deletions.
    pub deletes: u64,
    /// Records removed by relation cascades.
    pub cascade_removals: u64,
    /// Transaction-log entries evicted by the cap.
    pub log_evictions: u64,
    /// Full cache clears performed by the sweep.
    pub cache_sweeps: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters_start_at_zero() {
        let counters = StoreCounters::new();
        let snap = counters.snapshot();
        assert_eq!(snap.creates, 0);
        assert_eq!(snap.cache_hits, 0);
    }

    #[test]
    fn increments_are_visible() {
        let counters = StoreCounters::new();
        counters.record_create();
        counters.record_create();
        counters.record_cascade_removals(3);

        let snap = counters.snapshot();
        assert_eq!(snap.creates, 2);
        assert_eq!(snap.cascade_removals, 3);
    }

    #[test]
    fn concurrent_increments_do_not_lose_counts() {
        let counters = Arc::new(StoreCounters::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let counters = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counters.record_update();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.snapshot().updates, 4000);
    }
}
