//! Payload decoding
//!
//! Stream messages and snapshot bodies both carry the complete dataset as a
//! JSON array of objects. Decoding is all-or-nothing: a payload either
//! yields a full `Dataset` or an error, never a partial one.

use serde_json::Value;

use crate::error::{SyncError, SyncResult};
use crate::models::{Dataset, Record};

/// Decode a stream message into the full dataset
pub fn decode_stream_payload(payload: &str) -> SyncResult<Dataset> {
    let value: Value = serde_json::from_str(payload)?;
    match value {
        Value::Array(items) => records_from_array(items),
        other => Err(SyncError::Decode(format!(
            "expected an array of records, got {}",
            kind_of(&other)
        ))),
    }
}

/// Decode a snapshot body
///
/// Accepts a bare array or an object wrapping the array under
/// `envelope_field`. Any other shape is an empty dataset.
pub fn decode_snapshot(value: Value, envelope_field: &str) -> SyncResult<Dataset> {
    match value {
        Value::Array(items) => records_from_array(items),
        Value::Object(mut map) => match map.remove(envelope_field) {
            Some(Value::Array(items)) => records_from_array(items),
            _ => Ok(Dataset::default()),
        },
        _ => Ok(Dataset::default()),
    }
}

fn records_from_array(items: Vec<Value>) -> SyncResult<Dataset> {
    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(fields) => records.push(Record::new(fields)),
            other => {
                return Err(SyncError::Decode(format!(
                    "record {} is {}, expected an object",
                    index,
                    kind_of(&other)
                )));
            }
        }
    }
    Ok(Dataset::new(records))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
