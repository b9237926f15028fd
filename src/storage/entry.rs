//! Stored Entry
//!
//! An [`Entry`] is the unit of storage: a JSON value plus its metadata
//! (kind tag, creation time, optional absolute expiry). Timestamps are
//! wall-clock unix milliseconds rather than `Instant` because entries
//! outlive the process in the file-backed and hybrid stores.
//!
//! The serde field names (`valueKind`, `createdAt`, `expiresAt`) are the
//! persisted snapshot layout, shared by the store file, backups, and the
//! remote backend's wire payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codec::ValueKind;

/// A stored value with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// The stored JSON payload.
    pub value: Value,
    /// Shape tag computed at write time; diagnostic only.
    pub value_kind: ValueKind,
    /// Unix milliseconds of the last write to this entry.
    pub created_at: u64,
    /// Absolute unix-ms expiry; `None` means the entry never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Entry {
    /// Creates an entry for a value written now.
    pub fn new(value: Value, expires_at: Option<u64>) -> Self {
        let value_kind = ValueKind::of(&value);
        Self {
            value,
            value_kind,
            created_at: now_ms(),
            expires_at,
        }
    }

    /// Approximate in-memory footprint of this entry in bytes.
    ///
    /// Serialized payload length plus a constant per-entry overhead; only
    /// directionally useful, never exact.
    pub fn approx_bytes(&self) -> usize {
        crate::codec::serialized_size(&self.value) + ENTRY_OVERHEAD
    }
}

/// Constant per-entry overhead estimate for memory accounting.
const ENTRY_OVERHEAD: usize = 64;

/// Current wall-clock time in unix milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
