//! Error types for PaperDB.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in PaperDB operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The catalog document does not exist.
    ///
    /// The store never creates a catalog lazily; a missing catalog makes the
    /// store unusable and must abort startup.
    #[error("catalog not found at {path}")]
    CatalogMissing {
        /// Path where the catalog was expected.
        path: String,
    },

    /// The catalog document exists but cannot be parsed.
    #[error("catalog corrupt: {message}")]
    CatalogCorrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A collection file exists but cannot be read, decrypted, or parsed.
    ///
    /// A missing file is treated as an empty collection and does not produce
    /// this error; only an unreadable existing file does.
    #[error("collection file corrupt: {name}: {message}")]
    CollectionCorrupt {
        /// Name of the collection.
        name: String,
        /// Description of the failure.
        message: String,
    },

    /// The named collection is not declared in the catalog.
    #[error("unknown collection: {name}")]
    UnknownCollection {
        /// Name that was requested.
        name: String,
    },

    /// A declared relation target is not of the form `collection.field`.
    #[error("invalid relation target: {target}")]
    InvalidRelation {
        /// The malformed target string.
        target: String,
    },

    /// Another store instance holds the directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store directory path is invalid.
    #[error("invalid store directory: {message}")]
    InvalidDirectory {
        /// Description of the problem.
        message: String,
    },

    /// Serialization of a record list or catalog failed.
    #[error("serialization failed: {message}")]
    SerializationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed.
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Key derivation from the store secret failed.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a catalog-missing error.
    pub fn catalog_missing(path: impl Into<String>) -> Self {
        Self::CatalogMissing { path: path.into() }
    }

    /// Creates a catalog-corrupt error.
    pub fn catalog_corrupt(message: impl Into<String>) -> Self {
        Self::CatalogCorrupt {
            message: message.into(),
        }
    }

    /// Creates a collection-corrupt error.
    pub fn collection_corrupt(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CollectionCorrupt {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown-collection error.
    pub fn unknown_collection(name: impl Into<String>) -> Self {
        Self::UnknownCollection { name: name.into() }
    }

    /// Creates an invalid-relation error.
    pub fn invalid_relation(target: impl Into<String>) -> Self {
        Self::InvalidRelation {
            target: target.into(),
        }
    }

    /// Creates an invalid-directory error.
    pub fn invalid_directory(message: impl Into<String>) -> Self {
        Self::InvalidDirectory {
            message: message.into(),
        }
    }

    /// Creates a serialization-failed error.
    pub fn serialization_failed(message: impl Into<String>) -> Self {
        Self::SerializationFailed {
            message: message.into(),
        }
    }

    /// Creates an encryption-failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption-failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a key-derivation-failed error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }
}
