//! # PaperDB Core
//!
//! A lightweight, file-backed document store: durable, queryable collections
//! for a web application without a database server.
//!
//! This crate provides:
//! - Per-collection JSON file persistence with optional whole-file encryption
//! - An in-memory cache with coarse timed invalidation
//! - Mutual-exclusion locking per collection name
//! - An append-only transaction log capped at 1000 entries
//! - Query matching with `$in`/`$ne`/`$gt`/`$lt` operators
//! - Depth-one cascading delete across declared relations
//!
//! # Opening a store
//!
//! ```rust,ignore
//! use paperdb_core::{Catalog, CollectionConfig, DocumentStore, StoreConfig};
//! use std::path::Path;
//!
//! // Bootstrap once (deployment/tests); `open` never creates a catalog.
//! let mut catalog = Catalog::new(now_ms, false);
//! catalog.insert_collection(
//!     "jobs",
//!     CollectionConfig::new("jobs.json", "id")
//!         .relation("applications", "job_applications.jobId"),
//! );
//! let store = DocumentStore::create_store(Path::new("data"), StoreConfig::new(), catalog)?;
//!
//! // Subsequent runs:
//! let store = DocumentStore::open(Path::new("data"), StoreConfig::new())?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod catalog;
pub mod checksum;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod dir;
pub mod error;
pub mod lock;
pub mod query;
pub mod record;
pub mod relation;
pub mod stats;
pub mod store;
pub mod txlog;

pub use catalog::{Catalog, CollectionConfig, SyncStatus};
pub use clock::{Clock, SystemClock, TimestampMs};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use record::Record;
pub use stats::StatsSnapshot;
pub use store::DocumentStore;
pub use txlog::{LogEntry, LogQuery, Operation, MAX_LOG_ENTRIES};
