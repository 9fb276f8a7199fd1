//! Per-collection mutual exclusion.
//!
//! Grants exclusive access to a named collection for the duration of a load
//! or save. At most one holder per name at any instant; the held names form a
//! set, not a counter, so acquisition is non-reentrant - a thread acquiring a
//! name it already holds deadlocks. Callers must not nest acquisitions on the
//! same collection.
//!
//! This lock only excludes logical operations within this process. It does
//! not protect against out-of-process writers to the same file; the store
//! directory's advisory LOCK file handles whole-store exclusivity.

use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;

/// The per-collection lock manager.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl CollectionLocks {
    /// Creates a lock manager with no held names.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires exclusive access to `name`, blocking until it is free.
    ///
    /// There is no timeout; the wait is indefinite. The returned guard
    /// releases the name on drop.
    pub fn acquire<'a>(&'a self, name: &str) -> CollectionLockGuard<'a> {
        let mut held = self.held.lock();
        while held.contains(name) {
            self.released.wait(&mut held);
        }
        held.insert(name.to_string());

        CollectionLockGuard {
            locks: self,
            name: name.to_string(),
        }
    }

    /// Whether `name` is currently held.
    #[must_use]
    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().contains(name)
    }

    fn release(&self, name: &str) {
        let mut held = self.held.lock();
        held.remove(name);
        self.released.notify_all();
    }
}

/// RAII guard for a held collection name.
#[derive(Debug)]
pub struct CollectionLockGuard<'a> {
    locks: &'a CollectionLocks,
    name: String,
}

impl CollectionLockGuard<'_> {
    /// The collection name this guard holds.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CollectionLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.name);
    }
}
