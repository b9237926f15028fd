//! Operation Engine
//!
//! The process-wide singleton that owns the store. Every front-end call
//! lands here: validation via the entry codec, expiry policy on reads, and
//! a single write lock that serializes all mutations so read-modify-write
//! sequences (`incr`, `decr`, `append`, `expire`) never lose updates under
//! concurrent callers.
//!
//! Absence of a key is a normal result, never an error. `get` counts hits
//! and misses; `exists` and `ttl` do not, so liveness probes don't skew the
//! hit rate.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::codec::{validate_key, validate_value, Limits};
use crate::error::{StoreError, StoreResult};
use crate::storage::{
    compute_expiry, now_ms, remaining_seconds, write_snapshot, Backend, Entry,
};

/// Point-in-time operational statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Live keys in the store.
    pub total_keys: u64,
    /// `get` calls that found a live entry since startup.
    pub hit_count: u64,
    /// `get` calls that found nothing since startup.
    pub miss_count: u64,
    /// `hitCount / (hitCount + missCount)`, 0.0 before the first `get`.
    pub hit_rate: f64,
    /// Estimated bytes held by live entries.
    pub approx_bytes: u64,
    /// Backing store variant name.
    pub backend: &'static str,
    /// Seconds since the engine was constructed.
    pub uptime_seconds: u64,
}

/// The operation engine. One instance per process, shared via `Arc`.
pub struct KvEngine {
    backend: Arc<dyn Backend>,
    limits: Limits,
    backup_dir: PathBuf,
    /// Serializes every mutation. Read-modify-write operations hold it for
    /// the full read-compute-write span.
    write_lock: Mutex<()>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    started: Instant,
}

impl KvEngine {
    pub fn new(backend: Arc<dyn Backend>, limits: Limits, backup_dir: PathBuf) -> Self {
        Self {
            backend,
            limits,
            backup_dir,
            write_lock: Mutex::new(()),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    /// Stores a value, replacing any previous entry under the key.
    ///
    /// A positive `ttl_seconds` sets an absolute expiry; `None` or zero
    /// stores the entry without one.
    pub async fn set(&self, key: &str, value: Value, ttl_seconds: Option<u64>) -> StoreResult<()> {
        validate_key(key, &self.limits)?;
        validate_value(&value, &self.limits)?;

        let entry = Entry::new(value, compute_expiry(ttl_seconds));
        let _guard = self.write_lock.lock().await;
        self.backend.set(key, entry).await
    }

    /// Looks up a value. Absence (including lazy expiry) is `None`, never
    /// an error; malformed keys also read as absent.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Value>> {
        if validate_key(key, &self.limits).is_err() {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }
        match self.backend.get(key).await? {
            Some(entry) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    /// Removes a key; returns whether a live entry existed.
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        self.backend.delete(key).await
    }

    /// Expiry-aware existence check. Does not touch the hit/miss counters.
    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.backend.get(key).await?.is_some())
    }

    /// Lists live keys matching an optional glob pattern.
    pub async fn keys(&self, pattern: Option<&str>) -> StoreResult<Vec<String>> {
        self.backend.keys(pattern).await
    }

    /// Sets a fresh TTL on an existing key; returns whether it existed.
    ///
    /// Zero seconds removes the expiry rather than deleting the key.
    pub async fn expire(&self, key: &str, seconds: u64) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut entry) = self.backend.get(key).await? else {
            return Ok(false);
        };
        entry.expires_at = compute_expiry(Some(seconds));
        self.backend.set(key, entry).await?;
        Ok(true)
    }

    /// Removes any expiry from an existing key; returns whether it existed.
    pub async fn persist(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(mut entry) = self.backend.get(key).await? else {
            return Ok(false);
        };
        entry.expires_at = None;
        self.backend.set(key, entry).await?;
        Ok(true)
    }

    /// Remaining TTL in seconds: `-2` if the key is absent, `-1` if it has
    /// no expiry, otherwise the time left rounded up.
    pub async fn ttl(&self, key: &str) -> StoreResult<i64> {
        let entry = self.backend.get(key).await?;
        Ok(remaining_seconds(entry.as_ref(), now_ms()))
    }

    /// Increments the key's integer value by one, treating a missing or
    /// non-numeric current value as 0. Returns the new value.
    pub async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, 1).await
    }

    /// Decrements the key's integer value by one; same coercion as `incr`.
    pub async fn decr(&self, key: &str) -> StoreResult<i64> {
        self.add(key, -1).await
    }

    async fn add(&self, key: &str, delta: i64) -> StoreResult<i64> {
        validate_key(key, &self.limits)?;

        let _guard = self.write_lock.lock().await;
        let current = self.backend.get(key).await?;
        let base = current
            .as_ref()
            .and_then(|e| e.value.as_i64().or_else(|| e.value.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        let next = base.saturating_add(delta);

        // The TTL survives the rewrite; only the value and kind change.
        let expires_at = current.and_then(|e| e.expires_at);
        self.backend.set(key, Entry::new(json!(next), expires_at)).await?;
        Ok(next)
    }

    /// Appends to the key's string value, treating a missing or non-string
    /// current value as the empty string. Returns the new total length in
    /// characters.
    pub async fn append(&self, key: &str, suffix: &str) -> StoreResult<u64> {
        validate_key(key, &self.limits)?;

        let _guard = self.write_lock.lock().await;
        let current = self.backend.get(key).await?;
        let mut combined = current
            .as_ref()
            .and_then(|e| e.value.as_str())
            .unwrap_or("")
            .to_string();
        combined.push_str(suffix);

        let value = json!(combined);
        validate_value(&value, &self.limits)?;

        let expires_at = current.and_then(|e| e.expires_at);
        self.backend.set(key, Entry::new(value, expires_at)).await?;
        Ok(combined.chars().count() as u64)
    }

    /// Removes every entry.
    pub async fn clear(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.backend.clear().await
    }

    /// Current counters, usage estimate, and uptime.
    pub async fn stats(&self) -> StoreResult<StatsSnapshot> {
        let usage = self.backend.usage().await?;
        let hits = self.hit_count.load(Ordering::Relaxed);
        let misses = self.miss_count.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        Ok(StatsSnapshot {
            total_keys: usage.keys,
            hit_count: hits,
            miss_count: misses,
            hit_rate,
            approx_bytes: usage.approx_bytes,
            backend: self.backend.name(),
            uptime_seconds: self.started.elapsed().as_secs(),
        })
    }

    /// Exports a timestamped full snapshot into the backup directory and
    /// returns its path.
    ///
    /// Runs under the write lock so the snapshot is a consistent
    /// point-in-time view.
    pub async fn backup(&self) -> StoreResult<PathBuf> {
        let _guard = self.write_lock.lock().await;

        let keys = self
            .backend
            .keys(None)
            .await
            .map_err(|e| StoreError::BackupFailed(e.to_string()))?;
        let mut entries = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self
                .backend
                .get(&key)
                .await
                .map_err(|e| StoreError::BackupFailed(e.to_string()))?
            {
                entries.insert(key, entry);
            }
        }

        let path = self.backup_dir.join(format!("snapshot-{}.json", now_ms()));
        write_snapshot(&path, &entries).map_err(|e| StoreError::BackupFailed(e.to_string()))?;
        info!(path = %path.display(), keys = entries.len(), "backup written");
        Ok(path)
    }

    /// Final flush on shutdown.
    pub async fn shutdown(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        debug!("flushing store for shutdown");
        self.backend.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBackend, MemoryBackend};
    use std::time::Duration;
    use tempfile::tempdir;

    fn engine() -> (KvEngine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let engine = KvEngine::new(
            Arc::new(MemoryBackend::new()),
            Limits::default(),
            dir.path().join("backups"),
        );
        (engine, dir)
    }

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let (engine, _dir) = engine();

        engine.set("k", json!({"a": 1}), None).await.unwrap();
        assert_eq!(engine.get("k").await.unwrap(), Some(json!({"a": 1})));

        engine.set("k", json!("replaced"), None).await.unwrap();
        assert_eq!(engine.get("k").await.unwrap(), Some(json!("replaced")));
    }

    #[tokio::test]
    async fn test_get_missing_is_none_not_error() {
        let (engine, _dir) = engine();
        assert_eq!(engine.get("absent").await.unwrap(), None);
        // Malformed keys read as absent too.
        assert_eq!(engine.get("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_validation() {
        let dir = tempdir().unwrap();
        let engine = KvEngine::new(
            Arc::new(MemoryBackend::new()),
            Limits {
                max_key_len: 8,
                max_value_bytes: 16,
            },
            dir.path().join("backups"),
        );

        assert!(matches!(
            engine.set("", json!(1), None).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            engine.set("way_too_long_key", json!(1), None).await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            engine.set("k", json!("a".repeat(32)), None).await,
            Err(StoreError::ValueTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let (engine, _dir) = engine();

        engine.set("k", json!(1), None).await.unwrap();
        assert!(engine.exists("k").await.unwrap());
        assert!(engine.delete("k").await.unwrap());
        assert!(!engine.exists("k").await.unwrap());
        assert!(!engine.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let (engine, _dir) = engine();

        engine.set("user:1", json!(1), None).await.unwrap();
        engine.set("user:2", json!(2), None).await.unwrap();
        engine.set("order:1", json!(3), None).await.unwrap();

        let mut keys = engine.keys(Some("user:*")).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["user:1", "user:2"]);

        assert_eq!(engine.keys(None).await.unwrap().len(), 3);
        assert!(engine.keys(Some("nothing*")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incr_decr_semantics() {
        let (engine, _dir) = engine();

        assert_eq!(engine.incr("n").await.unwrap(), 1);
        assert_eq!(engine.incr("n").await.unwrap(), 2);
        assert_eq!(engine.incr("n").await.unwrap(), 3);
        assert_eq!(engine.decr("n").await.unwrap(), 2);

        // Missing key decrements from 0.
        assert_eq!(engine.decr("m").await.unwrap(), -1);

        // Non-numeric current value coerces to 0.
        engine.set("s", json!("text"), None).await.unwrap();
        assert_eq!(engine.incr("s").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_incr_preserves_ttl() {
        let (engine, _dir) = engine();

        engine.set("n", json!(1), Some(100)).await.unwrap();
        engine.incr("n").await.unwrap();

        let ttl = engine.ttl("n").await.unwrap();
        assert!(ttl > 0 && ttl <= 100);
    }

    #[tokio::test]
    async fn test_append_semantics() {
        let (engine, _dir) = engine();

        assert_eq!(engine.append("s", "a").await.unwrap(), 1);
        assert_eq!(engine.append("s", "b").await.unwrap(), 2);
        assert_eq!(engine.get("s").await.unwrap(), Some(json!("ab")));

        // Non-string current value coerces to the empty string.
        engine.set("n", json!(42), None).await.unwrap();
        assert_eq!(engine.append("n", "xy").await.unwrap(), 2);
        assert_eq!(engine.get("n").await.unwrap(), Some(json!("xy")));
    }

    #[tokio::test]
    async fn test_expire_ttl_persist() {
        let (engine, _dir) = engine();

        assert_eq!(engine.ttl("k").await.unwrap(), -2);
        assert!(!engine.expire("k", 10).await.unwrap());

        engine.set("k", json!(1), None).await.unwrap();
        assert_eq!(engine.ttl("k").await.unwrap(), -1);

        assert!(engine.expire("k", 10).await.unwrap());
        let ttl = engine.ttl("k").await.unwrap();
        assert!(ttl > 0 && ttl <= 10);

        assert!(engine.persist("k").await.unwrap());
        assert_eq!(engine.ttl("k").await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_huge_ttl_stays_live() {
        let (engine, _dir) = engine();

        engine.set("k", json!(1), Some(u64::MAX)).await.unwrap();
        assert!(engine.exists("k").await.unwrap());
        assert_eq!(engine.get("k").await.unwrap(), Some(json!(1)));
        assert!(engine.ttl("k").await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_lazy_expiration_on_read_paths() {
        let (engine, _dir) = engine();

        engine.set("short", json!(1), Some(1)).await.unwrap();
        assert!(engine.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(engine.get("short").await.unwrap(), None);
        assert!(!engine.exists("short").await.unwrap());
        assert!(engine.keys(None).await.unwrap().is_empty());
        assert_eq!(engine.ttl("short").await.unwrap(), -2);
    }

    #[tokio::test]
    async fn test_clear_resets_store() {
        let (engine, _dir) = engine();

        engine.set("a", json!(1), None).await.unwrap();
        engine.set("b", json!(2), None).await.unwrap();
        engine.clear().await.unwrap();

        assert!(engine.keys(None).await.unwrap().is_empty());
        assert_eq!(engine.stats().await.unwrap().total_keys, 0);
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let (engine, _dir) = engine();

        engine.set("k", json!(1), None).await.unwrap();
        engine.get("k").await.unwrap();
        engine.get("k").await.unwrap();
        engine.get("missing").await.unwrap();

        let stats = engine.stats().await.unwrap();
        assert_eq!(stats.total_keys, 1);
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.backend, "memory");
        assert!(stats.approx_bytes > 0);
    }

    #[tokio::test]
    async fn test_concurrent_incr_loses_no_updates() {
        let (engine, _dir) = engine();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.incr("counter").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(engine.get("counter").await.unwrap(), Some(json!(50)));
    }

    #[tokio::test]
    async fn test_backup_restores_into_fresh_engine() {
        let (engine, _dir) = engine();

        engine.set("a", json!(1), None).await.unwrap();
        engine.set("b", json!({"x": true}), Some(3600)).await.unwrap();

        let path = engine.backup().await.unwrap();
        assert!(path.exists());

        // A file backend opened over the snapshot reproduces the key set.
        let restored = FileBackend::open(path).unwrap();
        let mut keys = restored.keys(None).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(restored.get("a").await.unwrap().unwrap().value, json!(1));
    }
}
