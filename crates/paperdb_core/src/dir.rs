//! Store directory management.
//!
//! This module handles the file system layout for a PaperDB store:
//!
//! ```text
//! <store_path>/
//! ├─ catalog.json      # Catalog (collection registry + transaction log)
//! ├─ LOCK              # Advisory lock for single-instance access
//! ├─ jobs.json         # One file per declared collection...
//! └─ testimonials.json
//! ```
//!
//! The LOCK file ensures only one store instance can own the directory at a
//! time. It does not protect against arbitrary out-of-process writers that
//! ignore the lock; the per-collection lock manager only serializes logical
//! operations within this process.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// File names within the store directory.
const CATALOG_FILE: &str = "catalog.json";
const LOCK_FILE: &str = "LOCK";
/// Suffix for temporary files used in atomic writes.
const TEMP_SUFFIX: &str = ".tmp";

/// Manages the store directory structure and file locking.
///
/// # Thread Safety
///
/// `StoreDir` holds an exclusive advisory lock on the directory. Only one
/// instance can exist per directory at a time.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - The path exists but is not a directory
    /// - Another process holds the lock (`StoreLocked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::invalid_directory(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::invalid_directory(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the catalog document.
    #[must_use]
    pub fn catalog_path(&self) -> PathBuf {
        self.path.join(CATALOG_FILE)
    }

    /// Returns the path to a collection's data file.
    #[must_use]
    pub fn collection_path(&self, file_name: &str) -> PathBuf {
        self.path.join(file_name)
    }

    /// Reads a file fully, or returns `None` if it does not exist.
    pub fn read_file(&self, path: &Path) -> StoreResult<Option<Vec<u8>>> {
        if !path.exists() {
            return Ok(None);
        }

        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Some(data))
    }

    /// Writes a file atomically.
    ///
    /// Uses write-then-rename for crash safety:
    /// 1. Write to a temporary file next to the target
    /// 2. Sync the temporary file to disk
    /// 3. Rename over the target
    /// 4. Fsync the directory so the rename is durable
    pub fn write_file_atomic(&self, path: &Path, data: &[u8]) -> StoreResult<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::invalid_directory("target has no file name"))?;
        let temp_path = self.path.join(format!("{file_name}{TEMP_SUFFIX}"));

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, path)?;
        self.sync_directory()?;

        Ok(())
    }

    /// Syncs the store directory so metadata updates are durable.
    ///
    /// On Windows, directory fsync is not supported; NTFS journaling provides
    /// comparable metadata durability, so the explicit fsync is skipped.
    #[cfg(unix)]
    fn sync_directory(&self) -> StoreResult<()> {
        let dir = File::open(&self.path)?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StoreResult<()> {
        Ok(())
    }
}
