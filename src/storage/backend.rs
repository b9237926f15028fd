//! Backing Store Adapter
//!
//! One trait, four variants. The engine talks to an `Arc<dyn Backend>` and
//! never knows whether state lives in a process-local map, a file, or a
//! remote database:
//!
//! ```text
//!                     ┌────────────────┐
//!                     │    KvEngine    │
//!                     └───────┬────────┘
//!                             │  Arc<dyn Backend>
//!        ┌──────────┬─────────┴──────────┬───────────┐
//!        ▼          ▼                    ▼           ▼
//!    ┌────────┐ ┌────────┐          ┌────────┐  ┌────────┐
//!    │ Memory │ │  File  │          │ Hybrid │  │ Remote │
//!    │ (map)  │ │ (sync  │          │ (map + │  │ (RESP  │
//!    │        │ │ write) │          │ timer) │  │ client)│
//!    └────────┘ └────────┘          └────────┘  └────────┘
//! ```
//!
//! Contract: `get`, `set`, `delete`, and `keys` are atomic with respect to a
//! single key; expired entries are treated as absent on every read path
//! regardless of whether the background sweep has run.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::entry::Entry;
use crate::config::{Config, StorageMode};
use crate::error::StoreResult;

/// Approximate usage figures for operators; never exact.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    /// Number of live keys.
    pub keys: u64,
    /// Estimated bytes held, summed over key and serialized entry lengths.
    pub approx_bytes: u64,
}

/// Polymorphic persistence layer beneath the operation engine.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short variant name for logs and stats ("memory", "file", ...).
    fn name(&self) -> &'static str;

    /// Looks up a live entry; expired entries are removed and reported absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Entry>>;

    /// Inserts or overwrites an entry.
    async fn set(&self, key: &str, entry: Entry) -> StoreResult<()>;

    /// Removes a key; returns whether a live entry existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Enumerates live keys matching an optional glob pattern.
    async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>>;

    /// Removes every entry.
    async fn clear(&self) -> StoreResult<()>;

    /// Removes expired entries; returns how many were dropped. Backends with
    /// native server-side expiry report 0.
    async fn sweep(&self) -> StoreResult<u64>;

    /// Persists current state. A no-op for volatile backends; best-effort
    /// for remote ones.
    async fn flush(&self) -> StoreResult<()>;

    /// Approximate usage over live entries.
    async fn usage(&self) -> StoreResult<StorageUsage>;
}

/// Constructs the backend selected by the configuration.
///
/// File and hybrid variants hydrate from the store file under the data
/// directory if one exists; the remote variant connects eagerly so a bad
/// connection string fails at startup rather than on first request.
pub async fn open_backend(config: &Config) -> StoreResult<Arc<dyn Backend>> {
    match config.mode {
        StorageMode::Memory => Ok(Arc::new(super::memory::MemoryBackend::new())),
        StorageMode::File => {
            let backend = super::file::FileBackend::open(config.data_file())?;
            Ok(Arc::new(backend))
        }
        StorageMode::Hybrid => {
            let backend = super::hybrid::HybridBackend::open(config.data_file())?;
            Ok(Arc::new(backend))
        }
        StorageMode::Remote => {
            let url = config.remote_url.as_deref().unwrap_or("127.0.0.1:6379");
            let backend = super::remote::RemoteBackend::connect(url).await?;
            Ok(Arc::new(backend))
        }
    }
}

/// Hydrates entries from a snapshot file if one exists at `path`.
pub(super) fn hydrate(
    path: &Path,
) -> StoreResult<std::collections::HashMap<String, Entry>> {
    Ok(super::snapshot::read_snapshot(path)?.unwrap_or_default())
}
