//! The catalog: one metadata document describing every collection.
//!
//! The catalog is the store's registry. It is loaded once at startup and
//! fails fatally when missing or malformed - there is no lazy catalog
//! creation. It is re-saved after every collection save and after cache-clear
//! events, re-stamping `last_updated` and recomputing the advisory checksum.

use crate::checksum::content_checksum;
use crate::clock::TimestampMs;
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::txlog::TransactionLog;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Catalog document format version.
pub const CATALOG_VERSION: &str = "1.0";

/// Default coarse cache-invalidation interval in seconds.
pub const DEFAULT_AUTO_CLEAR_INTERVAL_SECS: u64 = 300;

/// Synchronization state of the catalog relative to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Catalog matches what was last persisted.
    Synced,
    /// In-memory state has diverged from disk.
    Dirty,
}

/// Coarse cache-invalidation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInvalidation {
    /// When the cache was last fully cleared (ms since epoch).
    pub last_clear: TimestampMs,
    /// How long cached collections stay valid before a full clear.
    pub auto_clear_interval_seconds: u64,
}

/// Per-collection configuration and bookkeeping.
///
/// Created when the catalog is first assembled, mutated after every
/// successful save of its collection, never deleted at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Data file name within the store directory.
    pub file_name: String,
    /// Field holding each record's primary key.
    pub primary_key_field: String,
    /// Declared index hints. Recorded but not enforced.
    #[serde(default)]
    pub index_hints: BTreeSet<String>,
    /// Declared relations: relation name to `"targetCollection.targetField"`.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
    /// Last successful save of this collection (ms since epoch).
    pub last_sync: TimestampMs,
    /// Number of records at the last save.
    pub record_count: usize,
}

impl CollectionConfig {
    /// Creates a configuration for a new collection.
    #[must_use]
    pub fn new(file_name: impl Into<String>, primary_key_field: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            primary_key_field: primary_key_field.into(),
            index_hints: BTreeSet::new(),
            relations: BTreeMap::new(),
            last_sync: 0,
            record_count: 0,
        }
    }

    /// Declares a relation to another collection.
    #[must_use]
    pub fn relation(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.relations.insert(name.into(), target.into());
        self
    }

    /// Declares an index hint.
    #[must_use]
    pub fn index_hint(mut self, field: impl Into<String>) -> Self {
        self.index_hints.insert(field.into());
        self
    }
}

/// The catalog document.
///
/// One per store instance; owns the collection registry and the capped
/// transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Document format version.
    pub version: String,
    /// When the store was created (ms since epoch).
    pub created_at: TimestampMs,
    /// When the catalog was last saved (ms since epoch).
    pub last_updated: TimestampMs,
    /// Advisory checksum over the serialized catalog (checksum field cleared).
    pub checksum: String,
    /// Whether collection files are whole-file encrypted.
    pub encryption_enabled: bool,
    /// Synchronization state.
    pub sync_status: SyncStatus,
    /// All declared collections.
    pub collections: BTreeMap<String, CollectionConfig>,
    /// The capped transaction log.
    #[serde(default)]
    pub transaction_log: TransactionLog,
    /// Coarse cache-invalidation bookkeeping.
    pub cache_invalidation: CacheInvalidation,
}

impl Catalog {
    /// Creates a fresh catalog with no collections.
    #[must_use]
    pub fn new(now: TimestampMs, encryption_enabled: bool) -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            created_at: now,
            last_updated: now,
            checksum: String::new(),
            encryption_enabled,
            sync_status: SyncStatus::Dirty,
            collections: BTreeMap::new(),
            transaction_log: TransactionLog::new(),
            cache_invalidation: CacheInvalidation {
                last_clear: now,
                auto_clear_interval_seconds: DEFAULT_AUTO_CLEAR_INTERVAL_SECS,
            },
        }
    }

    /// Declares a collection.
    pub fn insert_collection(&mut self, name: impl Into<String>, config: CollectionConfig) {
        self.collections.insert(name.into(), config);
        self.sync_status = SyncStatus::Dirty;
    }

    /// Looks up a collection's configuration.
    #[must_use]
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.get(name)
    }

    /// Looks up a collection's configuration, erroring on unknown names.
    ///
    /// An unknown collection name is a programmer error, not a data error.
    pub fn require_collection(&self, name: &str) -> StoreResult<&CollectionConfig> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::unknown_collection(name))
    }

    /// Loads the catalog from the store directory.
    ///
    /// # Errors
    ///
    /// Returns `CatalogMissing` if the document does not exist and
    /// `CatalogCorrupt` if it cannot be parsed. Both are fatal to startup.
    pub fn load(dir: &StoreDir) -> StoreResult<Self> {
        let path = dir.catalog_path();
        let data = dir
            .read_file(&path)?
            .ok_or_else(|| StoreError::catalog_missing(path.display().to_string()))?;

        let catalog: Self = serde_json::from_slice(&data)
            .map_err(|e| StoreError::catalog_corrupt(e.to_string()))?;

        if !catalog.verify_checksum() {
            // Advisory only: signal corruption, keep the store usable.
            tracing::warn!(path = %path.display(), "catalog checksum mismatch");
        }

        Ok(catalog)
    }

    /// Saves the catalog to the store directory.
    ///
    /// Re-stamps `last_updated`, recomputes the checksum, and writes the full
    /// document atomically.
    pub fn save(&mut self, dir: &StoreDir, now: TimestampMs) -> StoreResult<()> {
        self.last_updated = now;
        self.sync_status = SyncStatus::Synced;
        self.checksum = self.compute_checksum()?;

        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::serialization_failed(e.to_string()))?;
        dir.write_file_atomic(&dir.catalog_path(), &data)
    }

    /// Whether the stored checksum matches the document content.
    #[must_use]
    pub fn verify_checksum(&self) -> bool {
        match self.compute_checksum() {
            Ok(computed) => computed == self.checksum,
            Err(_) => false,
        }
    }

    /// Computes the checksum over the serialized catalog with the checksum
    /// field cleared.
    fn compute_checksum(&self) -> StoreResult<String> {
        let mut unstamped = self.clone();
        unstamped.checksum = String::new();
        let data = serde_json::to_vec(&unstamped)
            .map_err(|e| StoreError::serialization_failed(e.to_string()))?;
        Ok(content_checksum(&data))
    }
}
