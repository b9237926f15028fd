//! Store Snapshots
//!
//! The persisted state layout for the file and hybrid backends, and for
//! point-in-time backups: a single JSON document mapping each key to its
//! entry. Writes go through a temp file, fsync, and atomic rename so a
//! crash mid-write never leaves a torn store file behind.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::entry::Entry;
use crate::error::StoreResult;

/// Writes a full snapshot to `path`, creating parent directories as needed.
pub fn write_snapshot(path: &Path, entries: &HashMap<String, Entry>) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_vec_pretty(entries)?;

    let tmp = path.with_extension("tmp");
    let mut file = File::create(&tmp)?;
    file.write_all(&data)?;
    file.sync_all()?;

    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a snapshot from `path`. Returns `None` when no file exists yet.
pub fn read_snapshot(path: &Path) -> StoreResult<Option<HashMap<String, Entry>>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path)?;
    let entries = serde_json::from_slice(&data)?;
    Ok(Some(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut entries = HashMap::new();
        entries.insert("a".to_string(), Entry::new(json!(1), None));
        entries.insert("b".to_string(), Entry::new(json!("two"), Some(9_999_999_999_999)));

        write_snapshot(&path, &entries).unwrap();
        let back = read_snapshot(&path).unwrap().unwrap();
        assert_eq!(back, entries);
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        assert!(read_snapshot(&dir.path().join("absent.json"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/store.json");
        write_snapshot(&path, &HashMap::new()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        write_snapshot(&path, &HashMap::new()).unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}
