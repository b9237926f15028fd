//! Error Taxonomy
//!
//! All fallible operations in the store return [`StoreError`]. Absence of a key
//! is never an error - operations that look up a key report it as a normal
//! `Option::None` result.

use thiserror::Error;

/// Errors that can occur in the storage engine or a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key is empty or exceeds the configured maximum length.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The serialized value exceeds the configured maximum size.
    #[error("value too large: {size} bytes (max: {max})")]
    ValueTooLarge { size: usize, max: usize },

    /// Disk or serialization failure while reading/writing persisted state.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The remote backend connection is down or was lost mid-operation.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A point-in-time snapshot export could not be written.
    #[error("backup failed: {0}")]
    BackupFailed(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Persistence(e.to_string())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
