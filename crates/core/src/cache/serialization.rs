//! Pure functions for encoding snapshots and timestamps as local store values.
//!
//! Snapshots are stored as JSON arrays so the persisted copy stays readable.
//! Timestamps are stored as epoch milliseconds.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors that can occur during snapshot serialization/deserialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SerializationError {
    /// Failed to serialize a value.
    #[error("Failed to serialize: {0}")]
    SerializeFailed(String),
    /// Failed to deserialize a stored value.
    #[error("Failed to deserialize: {0}")]
    DeserializeFailed(String),
}

/// Result type for serialization operations.
pub type Result<T> = std::result::Result<T, SerializationError>;

/// Serializes a snapshot to a JSON array.
pub fn serialize_records<T: Serialize>(records: &[T]) -> Result<String> {
    serde_json::to_string(records).map_err(|e| SerializationError::SerializeFailed(e.to_string()))
}

/// Deserializes a JSON array into a snapshot.
pub fn deserialize_records<T: DeserializeOwned>(value: &str) -> Result<Vec<T>> {
    serde_json::from_str(value).map_err(|e| SerializationError::DeserializeFailed(e.to_string()))
}

/// Encodes a timestamp as epoch milliseconds.
pub fn serialize_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.timestamp_millis().to_string()
}

/// Decodes an epoch-milliseconds timestamp.
pub fn deserialize_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let millis = value
        .trim()
        .parse::<i64>()
        .map_err(|e| SerializationError::DeserializeFailed(e.to_string()))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| SerializationError::DeserializeFailed(format!("out of range: {millis}")))
}
