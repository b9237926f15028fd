//! Memory Backend
//!
//! Pure in-process variant: the store lives only in a [`MemoryTable`], so
//! nothing survives a restart. `flush` is a no-op. Fastest variant and the
//! default for tests.

use async_trait::async_trait;

use super::backend::{Backend, StorageUsage};
use super::entry::Entry;
use super::glob::KeyPattern;
use super::table::MemoryTable;
use crate::error::StoreResult;

/// Volatile in-memory backing store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: MemoryTable,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(self.table.get(key))
    }

    async fn set(&self, key: &str, entry: Entry) -> StoreResult<()> {
        self.table.set(key, entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.table.remove(key))
    }

    async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>> {
        Ok(self.table.keys(&KeyPattern::new(pattern)))
    }

    async fn clear(&self) -> StoreResult<()> {
        self.table.clear();
        Ok(())
    }

    async fn sweep(&self) -> StoreResult<u64> {
        Ok(self.table.sweep())
    }

    async fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(self.table.usage())
    }
}
