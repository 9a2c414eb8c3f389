//! Load/save of the persisted store list.
//!
//! Only startup and presentation-triggered CRUD go through here; the
//! monitor core never touches the disk.

use std::path::Path;

use thiserror::Error;

use crate::repo::Store;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read the persisted store list. A missing or malformed file loads as an
/// empty list so a fresh install starts clean.
pub fn load_stores(path: &Path) -> Vec<Store> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            tracing::warn!("could not read {}: {}", path.display(), err);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<Store>>(&text) {
        Ok(stores) => stores,
        Err(err) => {
            tracing::warn!("could not parse {}: {}", path.display(), err);
            Vec::new()
        }
    }
}

/// Persist the full store list, creating parent directories as needed.
pub fn save_stores(stores: &[Store], path: &Path) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(stores)?;
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_the_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stores.json");
        let stores = vec![
            Store::new("0001", "10.0.0.1").with_details("Granite", "1234"),
            Store::new("0002", ""),
        ];

        save_stores(&stores, &path).unwrap();
        assert_eq!(load_stores(&path), stores);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_stores(&dir.path().join("missing.json")).is_empty());
    }

    #[test]
    fn malformed_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stores.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(load_stores(&path).is_empty());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/stores.json");

        save_stores(&[Store::new("0001", "10.0.0.1")], &path).unwrap();
        assert_eq!(load_stores(&path).len(), 1);
    }
}
