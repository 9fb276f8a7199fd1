//! Relation target parsing.
//!
//! The catalog declares relations as `"targetCollection.targetField"`
//! strings. A relation is consulted in two places: `find_with_relations`
//! attaches matching target records to a base record, and the delete cascade
//! removes target records referencing a deleted primary key.

use crate::error::{StoreError, StoreResult};

/// A parsed relation target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationTarget {
    /// The related collection.
    pub collection: String,
    /// The field in the related collection holding the referencing key.
    pub field: String,
}

impl RelationTarget {
    /// Parses a `"collection.field"` declaration.
    ///
    /// The field part may itself contain dots; only the first dot splits.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRelation` if either part is empty or the dot is
    /// missing.
    pub fn parse(target: &str) -> StoreResult<Self> {
        let (collection, field) = target
            .split_once('.')
            .ok_or_else(|| StoreError::invalid_relation(target))?;

        if collection.is_empty() || field.is_empty() {
            return Err(StoreError::invalid_relation(target));
        }

        Ok(Self {
            collection: collection.to_string(),
            field: field.to_string(),
        })
    }
}
