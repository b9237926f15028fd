//! Configuration
//!
//! A single JSON config file controls the storage mode, network binding,
//! limits, and background task intervals. [`load`] creates the file with
//! defaults on first run so a fresh deployment starts with something to
//! edit; every field is optional in the file and falls back to its default.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::codec::Limits;

/// Which backing store variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Volatile in-process map.
    Memory,
    /// Disk-synced on every write.
    File,
    /// In-memory with periodic disk sync.
    Hybrid,
    /// External RESP server.
    Remote,
}

/// Full runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Backing store variant.
    pub mode: StorageMode,
    /// Directory for the store file and backups.
    pub data_dir: PathBuf,
    /// HTTP bind address.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Seconds between expiry sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds between disk syncs (hybrid mode only).
    pub sync_interval_secs: u64,
    /// Seconds between automatic backups; 0 disables them.
    pub backup_interval_secs: u64,
    /// Maximum key length in characters.
    pub max_key_len: usize,
    /// Maximum serialized value size in bytes.
    pub max_value_bytes: usize,
    /// Default log filter when RUST_LOG is unset.
    pub log_level: String,
    /// Connection string for remote mode, e.g. "redis://127.0.0.1:6379".
    pub remote_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: StorageMode::Hybrid,
            data_dir: PathBuf::from("./data"),
            host: "127.0.0.1".to_string(),
            port: 7379,
            sweep_interval_secs: 60,
            sync_interval_secs: 30,
            backup_interval_secs: 0,
            max_key_len: 1024,
            max_value_bytes: 1024 * 1024,
            log_level: "info".to_string(),
            remote_url: None,
        }
    }
}

impl Config {
    /// Size limits for the entry codec.
    pub fn limits(&self) -> Limits {
        Limits {
            max_key_len: self.max_key_len,
            max_value_bytes: self.max_value_bytes,
        }
    }

    /// Path of the store file for the file and hybrid backends.
    pub fn data_file(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Directory that point-in-time backups are written into.
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

/// Loads configuration from `path`, creating a default file if none exists.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        let config = Config::default();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating config directory {}", parent.display()))?;
            }
        }
        let data = serde_json::to_vec_pretty(&config)?;
        fs::write(path, data)
            .with_context(|| format!("writing default config to {}", path.display()))?;
        info!(path = %path.display(), "created default config file");
        return Ok(config);
    }

    let data = fs::read(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let config = serde_json::from_slice(&data)
        .with_context(|| format!("parsing config from {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_creates_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.mode, StorageMode::Hybrid);
        assert_eq!(config.port, 7379);

        // Reloading parses the file we just wrote.
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.port, config.port);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"mode": "memory", "port": 9000}"#).unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.mode, StorageMode::Memory);
        assert_eq!(config.port, 9000);
        assert_eq!(config.sweep_interval_secs, 60);
        assert_eq!(config.max_value_bytes, 1024 * 1024);
    }

    #[test]
    fn test_mode_names_are_lowercase() {
        let config: Config = serde_json::from_str(r#"{"mode": "remote"}"#).unwrap();
        assert_eq!(config.mode, StorageMode::Remote);
        assert!(serde_json::to_string(&StorageMode::File)
            .unwrap()
            .contains("file"));
    }

    #[test]
    fn test_derived_paths() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/stash"),
            ..Config::default()
        };
        assert_eq!(config.data_file(), PathBuf::from("/var/lib/stash/store.json"));
        assert_eq!(config.backup_dir(), PathBuf::from("/var/lib/stash/backups"));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(load(&path).is_err());
    }
}
