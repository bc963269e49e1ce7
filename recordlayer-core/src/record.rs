//! The untyped record representation shared by the projector, the merger and every backend.
//!
//! A [`Record`] is a BSON document: string keys mapping to scalars, nested documents, or arrays.
//! Records are plain values; cloning one is a deep copy.

use bson::{Bson, ser::serialize_to_bson};
use serde_json::Value;

use crate::error::{RecordStoreError, RecordStoreResult};

/// An untyped nested mapping representing one persisted entity.
pub type Record = bson::Document;

/// Structural equality between two record values.
///
/// Mappings compare equal when they hold the same keys with equal values, regardless of key
/// order. Integers and doubles compare by numeric value, so `Int32(1)`, `Int64(1)` and
/// `Double(1.0)` are all equal. Everything else falls back to `Bson` equality.
pub fn values_equal(left: &Bson, right: &Bson) -> bool {
    match (left, right) {
        (Bson::Document(a), Bson::Document(b)) => {
            a.len() == b.len()
                && a.iter().all(|(key, value)| {
                    b.get(key)
                        .is_some_and(|other| values_equal(value, other))
                })
        }
        (Bson::Array(a), Bson::Array(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| values_equal(x, y))
        }
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Looks up a possibly dotted path (`"profile.address.city"`) inside a record.
///
/// Each segment must name a key of a nested document; arrays are not traversed.
pub fn get_path<'a>(record: &'a Record, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = record.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Reads the identity of a record from its identifier field.
///
/// Strings are used verbatim and integers are rendered in decimal. A missing, null, or otherwise
/// typed identifier is rejected with [`RecordStoreError::InvalidRecord`].
pub fn record_identity(record: &Record, field: &str) -> RecordStoreResult<String> {
    match get_path(record, field) {
        Some(Bson::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Bson::Int32(id)) => Ok(id.to_string()),
        Some(Bson::Int64(id)) => Ok(id.to_string()),
        Some(Bson::Null) | None => Err(RecordStoreError::InvalidRecord(format!(
            "record has no value for identifier field {field}"
        ))),
        Some(other) => Err(RecordStoreError::InvalidRecord(format!(
            "identifier field {field} must be a string or an integer, found {:?}",
            other.element_type()
        ))),
    }
}

/// Converts a JSON object into a record.
///
/// # Errors
///
/// Returns [`RecordStoreError::InvalidRecord`] if the value is not a JSON object, or a
/// serialization error if a value has no BSON representation.
pub fn record_from_json(value: &Value) -> RecordStoreResult<Record> {
    match serialize_to_bson(value)? {
        Bson::Document(record) => Ok(record),
        other => Err(RecordStoreError::InvalidRecord(format!(
            "expected a JSON object, found {:?}",
            other.element_type()
        ))),
    }
}
