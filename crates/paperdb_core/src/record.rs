//! Record representation.
//!
//! A record is an open document: a typed timestamp envelope plus an open
//! string-keyed field map. The collection's primary key lives in the open map
//! under the field name the catalog declares for that collection; the store
//! itself only ever manages the two timestamps.

use crate::clock::TimestampMs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names managed by the store itself.
const RESERVED_FIELDS: [&str; 2] = ["created_at", "updated_at"];

/// One document in a collection.
///
/// Equality of the primary key within a collection is a caller-maintained
/// invariant: the store accepts duplicates on create and resolves lookups by
/// taking the first match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// When the record was created (ms since epoch).
    pub created_at: TimestampMs,
    /// When the record was last modified (ms since epoch).
    pub updated_at: TimestampMs,
    /// All caller-supplied fields, including the primary key.
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    /// Creates a record from caller-supplied fields, stamping both timestamps.
    ///
    /// Reserved field names (`created_at`, `updated_at`) in the input are
    /// discarded; the store owns those.
    #[must_use]
    pub fn new(mut fields: Map<String, Value>, now: TimestampMs) -> Self {
        for reserved in RESERVED_FIELDS {
            fields.remove(reserved);
        }
        Self {
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Returns a field value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a field value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return;
        }
        self.fields.insert(name, value);
    }

    /// Returns the record's value for the given primary-key field.
    #[must_use]
    pub fn key(&self, primary_key_field: &str) -> Option<&Value> {
        self.fields.get(primary_key_field)
    }

    /// Whether this record's primary key equals `id`.
    #[must_use]
    pub fn key_matches(&self, primary_key_field: &str, id: &Value) -> bool {
        self.key(primary_key_field) == Some(id)
    }

    /// Shallow-merges `patch` over this record.
    ///
    /// Unspecified fields are preserved. `updated_at` is refreshed and is
    /// guaranteed to strictly increase even when the clock has not advanced
    /// past the previous value (millisecond granularity).
    pub fn merge(&mut self, patch: Map<String, Value>, now: TimestampMs) {
        for (name, value) in patch {
            if RESERVED_FIELDS.contains(&name.as_str()) {
                continue;
            }
            self.fields.insert(name, value);
        }
        self.updated_at = now.max(self.updated_at + 1);
    }

    /// Returns the open field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serializes the full record (envelope and fields) to a JSON value.
    ///
    /// Used for transaction-log change payloads and relation attachment.
    #[must_use]
    pub fn to_value(&self) -> Value {
        // A Record always serializes to a JSON object.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
