//! In-Process Store Core
//!
//! [`MemoryTable`] is the single in-process map shared by the memory, file,
//! and hybrid backends. It implements the lazy-expiration read path: any
//! access that finds an expired entry treats it as absent and removes it
//! immediately, independent of the background sweep.
//!
//! A single `RwLock` guards the whole table. Per-key write contention is
//! already serialized above this layer by the engine's mutation lock, so
//! sharding the map would buy nothing here.

use std::collections::HashMap;
use std::sync::RwLock;

use super::backend::StorageUsage;
use super::entry::{now_ms, Entry};
use super::expiry::is_live;
use super::glob::KeyPattern;

/// Thread-safe key -> [`Entry`] map with lazy expiration.
#[derive(Debug, Default)]
pub struct MemoryTable {
    map: RwLock<HashMap<String, Entry>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a live entry, removing it if it has expired.
    pub fn get(&self, key: &str) -> Option<Entry> {
        let now = now_ms();

        // Fast path: read lock for the common live-or-absent cases.
        {
            let map = self.map.read().unwrap();
            match map.get(key) {
                Some(entry) if is_live(entry, now) => return Some(entry.clone()),
                Some(_) => {} // expired, fall through to remove
                None => return None,
            }
        }

        // Expired entry - take the write lock and remove it. Another writer
        // may have replaced the entry in between, so re-check liveness.
        let mut map = self.map.write().unwrap();
        match map.get(key) {
            Some(entry) if is_live(entry, now) => Some(entry.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Inserts or overwrites an entry.
    pub fn set(&self, key: &str, entry: Entry) {
        self.map.write().unwrap().insert(key.to_string(), entry);
    }

    /// Removes a key. Returns whether a *live* entry existed: an expired
    /// entry is logically absent, so removing it reports `false`.
    pub fn remove(&self, key: &str) -> bool {
        let now = now_ms();
        let mut map = self.map.write().unwrap();
        match map.remove(key) {
            Some(entry) => is_live(&entry, now),
            None => false,
        }
    }

    /// Enumerates live keys matching the pattern, eagerly dropping any
    /// expired entries encountered along the way.
    pub fn keys(&self, pattern: &KeyPattern) -> Vec<String> {
        let now = now_ms();
        let mut map = self.map.write().unwrap();
        map.retain(|_, entry| is_live(entry, now));
        map.keys().filter(|k| pattern.matches(k)).cloned().collect()
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.map.write().unwrap().clear();
    }

    /// Removes all expired entries; returns how many were dropped.
    pub fn sweep(&self) -> u64 {
        let now = now_ms();
        let mut map = self.map.write().unwrap();
        let before = map.len();
        map.retain(|_, entry| is_live(entry, now));
        (before - map.len()) as u64
    }

    /// Approximate usage over live entries.
    pub fn usage(&self) -> StorageUsage {
        let now = now_ms();
        let map = self.map.read().unwrap();
        let mut keys = 0u64;
        let mut bytes = 0u64;
        for (key, entry) in map.iter() {
            if is_live(entry, now) {
                keys += 1;
                bytes += (key.len() + entry.approx_bytes()) as u64;
            }
        }
        StorageUsage {
            keys,
            approx_bytes: bytes,
        }
    }

    /// Clones out all live entries, e.g. for a snapshot write.
    pub fn export(&self) -> HashMap<String, Entry> {
        let now = now_ms();
        let map = self.map.read().unwrap();
        map.iter()
            .filter(|(_, entry)| is_live(entry, now))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Replaces the table contents, e.g. when hydrating from a snapshot.
    pub fn import(&self, entries: HashMap<String, Entry>) {
        *self.map.write().unwrap() = entries;
    }
}
