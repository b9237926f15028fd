//! Entry Codec
//!
//! Validation and classification of keys and values before they reach a
//! backing store. These are pure functions with no side effects: the engine
//! calls them on every write path, and the front-ends rely on them to turn
//! malformed input into structured failures instead of stored garbage.
//!
//! Values are arbitrary JSON ([`serde_json::Value`]); the size limit is
//! enforced against the serialized form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Size limits applied at write time.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum key length in characters.
    pub max_key_len: usize,
    /// Maximum serialized value size in bytes.
    pub max_value_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_key_len: 1024,
            max_value_bytes: 1024 * 1024,
        }
    }
}

/// Diagnostic tag derived from a value's shape at write time.
///
/// Arrays, nulls, and maps all classify as `Object`. The tag is never
/// enforced on subsequent writes - a key may hold a number today and a
/// string tomorrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    Object,
}

impl ValueKind {
    /// Classifies a JSON value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => ValueKind::String,
            Value::Number(_) => ValueKind::Number,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Null | Value::Array(_) | Value::Object(_) => ValueKind::Object,
        }
    }
}

/// Validates a key against the configured limits.
///
/// Fails if the key is empty or longer than `max_key_len` characters.
pub fn validate_key(key: &str, limits: &Limits) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty".into()));
    }
    let len = key.chars().count();
    if len > limits.max_key_len {
        return Err(StoreError::InvalidKey(format!(
            "key length {} exceeds maximum {}",
            len, limits.max_key_len
        )));
    }
    Ok(())
}

/// Validates a value's serialized size against the configured limits.
///
/// Returns the serialized size in bytes on success.
pub fn validate_value(value: &Value, limits: &Limits) -> StoreResult<usize> {
    let size = serialized_size(value);
    if size > limits.max_value_bytes {
        return Err(StoreError::ValueTooLarge {
            size,
            max: limits.max_value_bytes,
        });
    }
    Ok(size)
}

/// Serialized size of a value in bytes.
pub fn serialized_size(value: &Value) -> usize {
    // Infallible for Value: it is already a JSON tree.
    serde_json::to_vec(value).map(|v| v.len()).unwrap_or(0)
}
