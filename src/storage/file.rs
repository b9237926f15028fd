//! File Backend
//!
//! Disk-synced variant: reads are served from an in-memory mirror, and
//! every mutating operation synchronously rewrites the whole store file.
//! Durable, but O(n) per write - acceptable only for small stores. On
//! startup the mirror hydrates from the most recent store file.

use async_trait::async_trait;
use std::path::PathBuf;

use super::backend::{hydrate, Backend, StorageUsage};
use super::entry::Entry;
use super::glob::KeyPattern;
use super::snapshot::write_snapshot;
use super::table::MemoryTable;
use crate::error::StoreResult;

/// Backing store that persists every mutation to a single JSON file.
#[derive(Debug)]
pub struct FileBackend {
    table: MemoryTable,
    path: PathBuf,
}

impl FileBackend {
    /// Opens the store at `path`, hydrating from it if it exists.
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let table = MemoryTable::new();
        table.import(hydrate(&path)?);
        Ok(Self { table, path })
    }

    fn persist(&self) -> StoreResult<()> {
        write_snapshot(&self.path, &self.table.export())
    }
}

#[async_trait]
impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(self.table.get(key))
    }

    async fn set(&self, key: &str, entry: Entry) -> StoreResult<()> {
        self.table.set(key, entry);
        self.persist()
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let existed = self.table.remove(key);
        if existed {
            self.persist()?;
        }
        Ok(existed)
    }

    async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>> {
        Ok(self.table.keys(&KeyPattern::new(pattern)))
    }

    async fn clear(&self) -> StoreResult<()> {
        self.table.clear();
        self.persist()
    }

    async fn sweep(&self) -> StoreResult<u64> {
        // The sweeper flushes after a sweep that removed entries, so the
        // rewrite happens once rather than per removal.
        Ok(self.table.sweep())
    }

    async fn flush(&self) -> StoreResult<()> {
        self.persist()
    }

    async fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(self.table.usage())
    }
}
