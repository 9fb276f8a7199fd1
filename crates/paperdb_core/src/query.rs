//! Predicate matching for `find`.
//!
//! A predicate is a JSON object mapping field names to conditions. A scalar
//! condition requires exact equality. An object condition is an operator
//! document, tested in this precedence: `$in`, `$ne`, `$gt`, `$lt` - the
//! first operator present wins, so operators are not combinable on one field.
//!
//! An operator document containing none of the four known operators leaves
//! the field unfiltered (the record matches on that field). This can
//! over-include records and is preserved, documented behavior rather than an
//! error.

use crate::record::Record;
use serde_json::{Map, Value};

/// Membership operator key.
const OP_IN: &str = "$in";
/// Inequality operator key.
const OP_NE: &str = "$ne";
/// Strict greater-than operator key.
const OP_GT: &str = "$gt";
/// Strict less-than operator key.
const OP_LT: &str = "$lt";

/// Filters `records` down to those matching `predicate`.
///
/// An empty predicate matches everything.
#[must_use]
pub fn apply<'a>(records: &'a [Record], predicate: &Map<String, Value>) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|record| matches(record, predicate))
        .collect()
}

/// Whether a record satisfies every field condition in the predicate.
#[must_use]
pub fn matches(record: &Record, predicate: &Map<String, Value>) -> bool {
    predicate
        .iter()
        .all(|(field, condition)| field_matches(record.get(field), condition))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> bool {
    match condition {
        Value::Object(ops) => operator_matches(value, ops),
        scalar => value == Some(scalar),
    }
}

fn operator_matches(value: Option<&Value>, ops: &Map<String, Value>) -> bool {
    if let Some(candidates) = ops.get(OP_IN) {
        return match (value, candidates) {
            (Some(v), Value::Array(list)) => list.contains(v),
            _ => false,
        };
    }
    if let Some(excluded) = ops.get(OP_NE) {
        return value != Some(excluded);
    }
    if let Some(bound) = ops.get(OP_GT) {
        return value.is_some_and(|v| compare_gt(v, bound));
    }
    if let Some(bound) = ops.get(OP_LT) {
        return value.is_some_and(|v| compare_gt(bound, v));
    }
    // No known operator: the field is not filtered.
    true
}

/// Strict `left > right`.
///
/// Numbers compare numerically, strings lexicographically; any other pairing
/// is not ordered and never matches.
fn compare_gt(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => match (l.as_f64(), r.as_f64()) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        },
        (Value::String(l), Value::String(r)) => l > r,
        _ => false,
    }
}
