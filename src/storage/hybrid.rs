//! Hybrid Backend
//!
//! Memory-primary variant with a bounded durability window: reads and
//! writes hit the in-memory table, and a timer-driven [`Syncer`] task
//! persists the full store to disk (default every 30s) whenever something
//! changed. On startup the table hydrates from the most recent snapshot.
//!
//! `flush` writes synchronously when the store is dirty, so a graceful
//! shutdown loses nothing; a crash loses at most one sync interval.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::backend::{hydrate, Backend, StorageUsage};
use super::entry::Entry;
use super::glob::KeyPattern;
use super::snapshot::write_snapshot;
use super::table::MemoryTable;
use crate::error::StoreResult;

/// Backing store that syncs to disk on a timer instead of per write.
#[derive(Debug)]
pub struct HybridBackend {
    table: MemoryTable,
    path: PathBuf,
    dirty: AtomicBool,
}

impl HybridBackend {
    /// Opens the store at `path`, hydrating from it if it exists.
    pub fn open(path: PathBuf) -> StoreResult<Self> {
        let table = MemoryTable::new();
        table.import(hydrate(&path)?);
        Ok(Self {
            table,
            path,
            dirty: AtomicBool::new(false),
        })
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Backend for HybridBackend {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Entry>> {
        Ok(self.table.get(key))
    }

    async fn set(&self, key: &str, entry: Entry) -> StoreResult<()> {
        self.table.set(key, entry);
        self.mark_dirty();
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let existed = self.table.remove(key);
        if existed {
            self.mark_dirty();
        }
        Ok(existed)
    }

    async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>> {
        Ok(self.table.keys(&KeyPattern::new(pattern)))
    }

    async fn clear(&self) -> StoreResult<()> {
        self.table.clear();
        self.mark_dirty();
        Ok(())
    }

    async fn sweep(&self) -> StoreResult<u64> {
        let removed = self.table.sweep();
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    async fn flush(&self) -> StoreResult<()> {
        // Skip the rewrite when nothing changed since the last sync.
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if let Err(e) = write_snapshot(&self.path, &self.table.export()) {
            // Keep the dirty flag so the next tick retries.
            self.mark_dirty();
            return Err(e);
        }
        Ok(())
    }

    async fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(self.table.usage())
    }
}

/// Handle to the timer-driven sync task. Dropping the handle stops it.
#[derive(Debug)]
pub struct Syncer {
    shutdown_tx: watch::Sender<bool>,
}

impl Syncer {
    /// Starts periodic flushing of a backend.
    pub fn start(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sync_loop(backend, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs(), "disk sync task started");

        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Syncer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sync_loop(
    backend: Arc<dyn Backend>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("disk sync task received shutdown signal");
                    return;
                }
            }
        }

        if let Err(e) = backend.flush().await {
            warn!(error = %e, "periodic sync failed, will retry next tick");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_writes_reach_disk_only_on_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = HybridBackend::open(path.clone()).unwrap();
        backend.set("k", Entry::new(json!(1), None)).await.unwrap();
        assert!(!path.exists());

        backend.flush().await.unwrap();
        assert!(path.exists());

        let reopened = HybridBackend::open(path).unwrap();
        assert_eq!(reopened.get("k").await.unwrap().unwrap().value, json!(1));
    }

    #[tokio::test]
    async fn test_flush_skips_when_clean() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = HybridBackend::open(path.clone()).unwrap();
        backend.set("k", Entry::new(json!(1), None)).await.unwrap();
        backend.flush().await.unwrap();

        // Remove the file; a clean flush must not recreate it.
        std::fs::remove_file(&path).unwrap();
        backend.flush().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_syncer_persists_on_timer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = Arc::new(HybridBackend::open(path.clone()).unwrap());
        let _syncer = Syncer::start(
            Arc::clone(&backend) as Arc<dyn Backend>,
            Duration::from_millis(20),
        );

        backend.set("k", Entry::new(json!("v"), None)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(path.exists());
    }
}
