//! The document store facade.
//!
//! `DocumentStore` is the entry point for the rest of the application. It
//! owns the catalog, the record cache, the per-collection lock manager, and
//! the transaction log, and exposes the public operation surface:
//! `find`, `find_by_id`, `create`, `update`, `delete`, `find_with_relations`,
//! `stats`, `invalidate_cache`, and `query_log`.
//!
//! Control flow for a mutation: the collection's lock is acquired once for
//! the whole load-mutate-persist sequence, the data file and cache are
//! updated, the catalog (counters + transaction-log entry) is persisted, and
//! the lock is released. The delete cascade runs after release so a relation
//! may target any collection, including the source, without nested
//! acquisition of the non-reentrant lock.

use crate::cache::RecordCache;
use crate::catalog::{Catalog, CollectionConfig};
use crate::clock::{Clock, SystemClock, TimestampMs};
use crate::config::StoreConfig;
use crate::crypto::{EncryptionKey, FileCipher};
use crate::dir::StoreDir;
use crate::error::{StoreError, StoreResult};
use crate::lock::CollectionLocks;
use crate::query;
use crate::record::Record;
use crate::relation::RelationTarget;
use crate::stats::{StatsSnapshot, StoreCounters};
use crate::txlog::{LogEntry, LogQuery, Operation};
use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use uuid::Uuid;

/// A file-backed document store.
///
/// The store is constructed once and shared by callers, typically behind an
/// `Arc`. All operations take `&self` and are safe to call from multiple
/// threads; operations against the same collection are strictly serialized,
/// operations against different collections interleave freely.
pub struct DocumentStore {
    inner: Arc<StoreInner>,
    sweeper: Option<SweeperHandle>,
}

struct StoreInner {
    dir: StoreDir,
    catalog: RwLock<Catalog>,
    cache: RecordCache,
    locks: CollectionLocks,
    counters: StoreCounters,
    cipher: Option<FileCipher>,
    clock: Box<dyn Clock>,
    actor: Option<String>,
}

/// Fields of a collection's configuration needed outside the catalog lock.
#[derive(Clone)]
struct CollectionInfo {
    file_name: String,
    primary_key_field: String,
}

impl DocumentStore {
    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// Fails fatally when the directory or catalog is missing or the catalog
    /// is malformed; the store never creates a catalog lazily. Also fails
    /// when the catalog declares encryption but `config` carries no secret,
    /// or when another instance holds the directory lock.
    pub fn open(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        Self::open_with_clock(path, config, Box::new(SystemClock))
    }

    /// Opens an existing store with an injected clock.
    pub fn open_with_clock(
        path: &Path,
        config: StoreConfig,
        clock: Box<dyn Clock>,
    ) -> StoreResult<Self> {
        let dir = StoreDir::open(path, false)?;
        let catalog = Catalog::load(&dir)?;
        Self::assemble(dir, catalog, config, clock)
    }

    /// Creates a new store from a catalog and opens it.
    ///
    /// This is the explicit bootstrap path for deployment and tests; `open`
    /// itself never creates a catalog.
    ///
    /// # Errors
    ///
    /// Fails if the directory already holds a catalog.
    pub fn create_store(path: &Path, config: StoreConfig, catalog: Catalog) -> StoreResult<Self> {
        Self::create_store_with_clock(path, config, catalog, Box::new(SystemClock))
    }

    /// Creates a new store with an injected clock.
    pub fn create_store_with_clock(
        path: &Path,
        config: StoreConfig,
        mut catalog: Catalog,
        clock: Box<dyn Clock>,
    ) -> StoreResult<Self> {
        let dir = StoreDir::open(path, true)?;
        if dir.read_file(&dir.catalog_path())?.is_some() {
            return Err(StoreError::invalid_directory(format!(
                "catalog already exists in {}",
                dir.path().display()
            )));
        }

        catalog.save(&dir, clock.now_ms())?;
        Self::assemble(dir, catalog, config, clock)
    }

    fn assemble(
        dir: StoreDir,
        catalog: Catalog,
        config: StoreConfig,
        clock: Box<dyn Clock>,
    ) -> StoreResult<Self> {
        let cipher = if catalog.encryption_enabled {
            let secret = config.encryption_secret.as_deref().ok_or_else(|| {
                StoreError::key_derivation_failed(
                    "catalog declares encryption but no secret was configured",
                )
            })?;
            // Salt is stable for the lifetime of the store.
            let salt = catalog.created_at.to_string();
            let key = EncryptionKey::derive_from_secret(secret.as_bytes(), salt.as_bytes())?;
            Some(FileCipher::new(&key))
        } else {
            None
        };

        let inner = Arc::new(StoreInner {
            dir,
            catalog: RwLock::new(catalog),
            cache: RecordCache::new(),
            locks: CollectionLocks::new(),
            counters: StoreCounters::new(),
            cipher,
            clock,
            actor: config.actor.clone(),
        });

        let sweeper = if config.background_sweeper {
            Some(SweeperHandle::spawn(Arc::clone(&inner), config.sweep_tick))
        } else {
            None
        };

        Ok(Self { inner, sweeper })
    }

    /// Returns all records of a collection matching `predicate`.
    ///
    /// An empty predicate returns every record. See [`crate::query`] for the
    /// supported operators.
    pub fn find(&self, name: &str, predicate: &Map<String, Value>) -> StoreResult<Vec<Record>> {
        self.inner.maybe_sweep();
        let records = self.inner.load_records(name)?;
        Ok(query::apply(&records, predicate)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Returns the first record whose primary key equals `id`.
    ///
    /// Returns `None` when no record matches; never an error for a missing
    /// id. Duplicate keys resolve to the first match.
    pub fn find_by_id(&self, name: &str, id: &Value) -> StoreResult<Option<Record>> {
        self.inner.maybe_sweep();
        let info = self.inner.collection_info(name)?;
        let records = self.inner.load_records(name)?;
        Ok(records
            .iter()
            .find(|r| r.key_matches(&info.primary_key_field, id))
            .cloned())
    }

    /// Creates a record from caller-supplied fields.
    ///
    /// A primary-key value is generated (UUID v4) when the declared key field
    /// is absent; `created_at`/`updated_at` are stamped. Returns the stored
    /// record. Key uniqueness is not enforced.
    pub fn create(&self, name: &str, data: Map<String, Value>) -> StoreResult<Record> {
        self.inner.maybe_sweep();
        let info = self.inner.collection_info(name)?;
        let now = self.inner.clock.now_ms();

        let mut record = Record::new(data, now);
        if record.key(&info.primary_key_field).is_none() {
            record.set(
                info.primary_key_field.clone(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }
        let record_id = record
            .key(&info.primary_key_field)
            .cloned()
            .unwrap_or(Value::Null);

        {
            let _guard = self.inner.locks.acquire(name);
            let mut records = self.inner.load_records_locked(name, &info)?.as_ref().clone();
            records.push(record.clone());

            let entry = LogEntry::new(
                Operation::Create,
                name,
                record_id,
                record.to_value(),
                self.inner.actor.clone(),
                now,
            );
            self.inner.persist_locked(name, &info, records, Some(entry), now)?;
        }

        self.inner.counters.record_create();
        Ok(record)
    }

    /// Shallow-merges `patch` over the first record whose key equals `id`.
    ///
    /// Unspecified fields are preserved; `updated_at` strictly increases.
    /// Returns the updated record, or `None` when no record matches.
    pub fn update(
        &self,
        name: &str,
        id: &Value,
        patch: Map<String, Value>,
    ) -> StoreResult<Option<Record>> {
        self.inner.maybe_sweep();
        let info = self.inner.collection_info(name)?;
        let now = self.inner.clock.now_ms();

        let updated = {
            let _guard = self.inner.locks.acquire(name);
            let mut records = self.inner.load_records_locked(name, &info)?.as_ref().clone();

            let Some(position) = records
                .iter()
                .position(|r| r.key_matches(&info.primary_key_field, id))
            else {
                return Ok(None);
            };

            let before = records[position].to_value();
            records[position].merge(patch, now);
            let after = records[position].clone();

            let entry = LogEntry::new(
                Operation::Update,
                name,
                id.clone(),
                json!({ "before": before, "after": after.to_value() }),
                self.inner.actor.clone(),
                now,
            );
            self.inner.persist_locked(name, &info, records, Some(entry), now)?;
            after
        };

        self.inner.counters.record_update();
        Ok(Some(updated))
    }

    /// Removes the first record whose primary key equals `id`.
    ///
    /// Returns `false` when no record matches. On removal, every declared
    /// relation of the collection is cascaded depth-one: dependent records in
    /// the target collection whose target field equals the deleted key are
    /// removed as well. The cascade does not recurse into the target's own
    /// relations, and its cross-collection write is not atomic with the
    /// triggering delete.
    pub fn delete(&self, name: &str, id: &Value) -> StoreResult<bool> {
        self.inner.maybe_sweep();
        let info = self.inner.collection_info(name)?;
        let now = self.inner.clock.now_ms();

        let removed = {
            let _guard = self.inner.locks.acquire(name);
            let mut records = self.inner.load_records_locked(name, &info)?.as_ref().clone();

            let Some(position) = records
                .iter()
                .position(|r| r.key_matches(&info.primary_key_field, id))
            else {
                return Ok(false);
            };

            let removed = records.remove(position);
            let entry = LogEntry::new(
                Operation::Delete,
                name,
                id.clone(),
                removed.to_value(),
                self.inner.actor.clone(),
                now,
            );
            self.inner.persist_locked(name, &info, records, Some(entry), now)?;
            removed
        };

        self.inner.counters.record_delete();
        self.inner.cascade_delete(name, &info, &removed)?;
        Ok(true)
    }

    /// Loads a record and attaches its related records.
    ///
    /// For each requested relation declared in the catalog, every target
    /// record whose target field equals the base record's primary-key value
    /// is attached as an array field named after the relation. Requested
    /// names with no declaration are skipped.
    pub fn find_with_relations(
        &self,
        name: &str,
        id: &Value,
        relation_names: &[&str],
    ) -> StoreResult<Option<Record>> {
        let Some(mut base) = self.find_by_id(name, id)? else {
            return Ok(None);
        };

        let info = self.inner.collection_info(name)?;
        let key_value = base
            .key(&info.primary_key_field)
            .cloned()
            .unwrap_or(Value::Null);

        let declared: Vec<(String, String)> = {
            let catalog = self.inner.catalog.read();
            let config = catalog.require_collection(name)?;
            relation_names
                .iter()
                .filter_map(|requested| {
                    config
                        .relations
                        .get(*requested)
                        .map(|target| ((*requested).to_string(), target.clone()))
                })
                .collect()
        };

        for (relation_name, target_decl) in declared {
            let target = RelationTarget::parse(&target_decl)?;
            let target_records = self.inner.load_records(&target.collection)?;
            let related: Vec<Value> = target_records
                .iter()
                .filter(|r| r.get(&target.field) == Some(&key_value))
                .map(Record::to_value)
                .collect();
            base.set(relation_name, Value::Array(related));
        }

        Ok(Some(base))
    }

    /// Queries the transaction log, newest first.
    pub fn query_log(&self, query: &LogQuery) -> Vec<LogEntry> {
        let catalog = self.inner.catalog.read();
        catalog
            .transaction_log
            .query(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Clears one cached collection, or the whole cache when `name` is `None`.
    ///
    /// A full clear stamps `last_clear` and persists the catalog.
    pub fn invalidate_cache(&self, name: Option<&str>) -> StoreResult<()> {
        self.inner.cache.invalidate(name);
        if name.is_none() {
            let now = self.inner.clock.now_ms();
            let mut catalog = self.inner.catalog.write();
            catalog.cache_invalidation.last_clear = now;
            catalog.save(&self.inner.dir, now)?;
        }
        Ok(())
    }

    /// Returns a point-in-time snapshot of counters and catalog bookkeeping.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        let counters = self.inner.counters.snapshot();
        let catalog = self.inner.catalog.read();

        StatsSnapshot {
            loads: counters.loads,
            cache_hits: counters.cache_hits,
            creates: counters.creates,
            updates: counters.updates,
            deletes: counters.deletes,
            cascade_removals: counters.cascade_removals,
            log_evictions: counters.log_evictions,
            cache_sweeps: counters.cache_sweeps,
            record_counts: catalog
                .collections
                .iter()
                .map(|(name, config)| (name.clone(), config.record_count))
                .collect(),
            log_entries: catalog.transaction_log.len(),
            cached_collections: self.inner.cache.len(),
            cache_last_clear: catalog.cache_invalidation.last_clear,
        }
    }
}

impl Drop for DocumentStore {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop();
        }
    }
}

impl StoreInner {
    /// Reads the per-collection fields needed outside the catalog lock.
    fn collection_info(&self, name: &str) -> StoreResult<CollectionInfo> {
        let catalog = self.catalog.read();
        let config = catalog.require_collection(name)?;
        Ok(CollectionInfo {
            file_name: config.file_name.clone(),
            primary_key_field: config.primary_key_field.clone(),
        })
    }

    /// Loads a collection's records, from cache when possible.
    fn load_records(&self, name: &str) -> StoreResult<Arc<Vec<Record>>> {
        let info = self.collection_info(name)?;

        if let Some(records) = self.cache.get(name) {
            self.counters.record_cache_hit();
            return Ok(records);
        }

        let _guard = self.locks.acquire(name);
        self.load_records_locked(name, &info)
    }

    /// Loads a collection's records with the collection lock already held.
    ///
    /// A missing file is an empty collection; a file that exists but cannot
    /// be read, decrypted, or parsed is `CollectionCorrupt`.
    fn load_records_locked(&self, name: &str, info: &CollectionInfo) -> StoreResult<Arc<Vec<Record>>> {
        // Another thread may have populated the cache while we waited.
        if let Some(records) = self.cache.get(name) {
            self.counters.record_cache_hit();
            return Ok(records);
        }

        let path = self.dir.collection_path(&info.file_name);
        let records = match self.dir.read_file(&path)? {
            None => Vec::new(),
            Some(raw) => {
                let plaintext = match &self.cipher {
                    Some(cipher) => cipher.decrypt(&raw).map_err(|e| {
                        tracing::warn!(collection = name, error = %e, "collection decrypt failed");
                        StoreError::collection_corrupt(name, e.to_string())
                    })?,
                    None => raw,
                };
                serde_json::from_slice(&plaintext).map_err(|e| {
                    tracing::warn!(collection = name, error = %e, "collection parse failed");
                    StoreError::collection_corrupt(name, e.to_string())
                })?
            }
        };

        let records = Arc::new(records);
        self.cache.put(name, Arc::clone(&records));
        self.counters.record_load();
        tracing::debug!(collection = name, count = records.len(), "loaded from disk");
        Ok(records)
    }

    /// Persists a collection with its lock held, then commits the catalog.
    ///
    /// Writes the data file, replaces the cache entry, updates the
    /// collection's `record_count`/`last_sync`, appends the log entry when
    /// one is supplied, and saves the catalog. Save failures propagate.
    fn persist_locked(
        &self,
        name: &str,
        info: &CollectionInfo,
        records: Vec<Record>,
        entry: Option<LogEntry>,
        now: TimestampMs,
    ) -> StoreResult<()> {
        let plaintext = serde_json::to_vec_pretty(&records)
            .map_err(|e| StoreError::serialization_failed(e.to_string()))?;
        let data = match &self.cipher {
            Some(cipher) => cipher.encrypt(&plaintext)?,
            None => plaintext,
        };

        let path = self.dir.collection_path(&info.file_name);
        self.dir.write_file_atomic(&path, &data)?;

        let count = records.len();
        self.cache.put(name, Arc::new(records));

        let mut catalog = self.catalog.write();
        if let Some(config) = catalog.collections.get_mut(name) {
            config.record_count = count;
            config.last_sync = now;
        }
        if let Some(entry) = entry {
            if catalog.transaction_log.append(entry).is_some() {
                self.counters.record_log_eviction();
            }
        }
        catalog.save(&self.dir, now)
    }

    /// Removes dependents of a deleted record from every related collection.
    ///
    /// Depth-one only; runs without the source collection's lock held, so a
    /// relation may target any collection. Cascaded removals update files and
    /// counters but are not logged; only the triggering delete gets an entry.
    fn cascade_delete(&self, name: &str, info: &CollectionInfo, removed: &Record) -> StoreResult<()> {
        let Some(key_value) = removed.key(&info.primary_key_field).cloned() else {
            return Ok(());
        };

        let relations: Vec<String> = {
            let catalog = self.catalog.read();
            match catalog.collection(name) {
                Some(config) => config.relations.values().cloned().collect(),
                None => Vec::new(),
            }
        };

        for target_decl in relations {
            let target = RelationTarget::parse(&target_decl)?;
            let target_info = self.collection_info(&target.collection)?;
            let now = self.clock.now_ms();

            let _guard = self.locks.acquire(&target.collection);
            let records = self.load_records_locked(&target.collection, &target_info)?;

            let kept: Vec<Record> = records
                .iter()
                .filter(|r| r.get(&target.field) != Some(&key_value))
                .cloned()
                .collect();
            let removed_count = records.len() - kept.len();
            if removed_count == 0 {
                continue;
            }

            self.persist_locked(&target.collection, &target_info, kept, None, now)?;
            self.counters.record_cascade_removals(removed_count as u64);
            tracing::debug!(
                source = name,
                related = target.collection.as_str(),
                removed = removed_count,
                "cascade removed dependents"
            );
        }

        Ok(())
    }

    /// Clears the cache when the invalidation interval has elapsed.
    ///
    /// Called at the start of every public operation and by the background
    /// sweeper. A failed catalog stamp is logged, not propagated; the sweep
    /// is ancillary to the operation that triggered it.
    fn maybe_sweep(&self) {
        let now = self.clock.now_ms();
        let (last_clear, interval) = {
            let catalog = self.catalog.read();
            (
                catalog.cache_invalidation.last_clear,
                catalog.cache_invalidation.auto_clear_interval_seconds,
            )
        };

        if !self.cache.sweep_if_due(now, last_clear, interval) {
            return;
        }
        self.counters.record_cache_sweep();

        let mut catalog = self.catalog.write();
        catalog.cache_invalidation.last_clear = now;
        if let Err(e) = catalog.save(&self.dir, now) {
            tracing::warn!(error = %e, "failed to persist cache-clear stamp");
        }
    }
}

/// Background thread that drives the coarse cache sweep.
struct SweeperHandle {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    fn spawn(inner: Arc<StoreInner>, tick: std::time::Duration) -> Self {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let thread_stop = Arc::clone(&stop);

        let handle = std::thread::Builder::new()
            .name("paperdb-sweeper".to_string())
            .spawn(move || {
                let (flag, signal) = &*thread_stop;
                let mut stopped = flag.lock();
                while !*stopped {
                    let _ = signal.wait_for(&mut stopped, tick);
                    if *stopped {
                        break;
                    }
                    inner.maybe_sweep();
                }
            })
            .ok();

        Self {
            stop,
            handle,
        }
    }

    fn stop(mut self) {
        let (flag, signal) = &*self.stop;
        *flag.lock() = true;
        signal.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
