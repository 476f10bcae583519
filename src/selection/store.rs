//! Persistent key-value store for user flags and the current selection.
//!
//! Values are plain strings. [`SelectionState`](super::SelectionState) owns
//! the key scheme; stores only move strings in and out.

use crate::core::error::StoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key-value persistence collaborator.
pub trait SettingsStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Every stored key, sorted.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Volatile store. Also the fallback when persistence fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    version: u32,
    values: BTreeMap<String, String>,
}

const SETTINGS_FILE_VERSION: u32 = 1;

/// JSON file store. Every write rewrites the file through a temporary
/// sibling and a rename, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open a store, reading existing values if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let values = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let file: SettingsFile = serde_json::from_str(&text)?;
            if file.version != SETTINGS_FILE_VERSION {
                return Err(StoreError::Unavailable(format!(
                    "{} has unsupported version {}",
                    path.display(),
                    file.version
                )));
            }
            file.values
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let file = SettingsFile {
            version: SETTINGS_FILE_VERSION,
            values: values.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.values.lock().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        store.set("favourite/sepia", "true").unwrap();
        assert_eq!(store.get("favourite/sepia").unwrap().as_deref(), Some("true"));
        store.remove("favourite/sepia").unwrap();
        store.remove("favourite/sepia").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("rating/sepia", "2").unwrap();
            store.set("current/category", "color").unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("rating/sepia").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["current/category", "rating/sepia"]);
        assert!(!dir.path().join("settings.json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("missing").join("settings.json")).unwrap();
        assert!(store.set("hidden/x", "true").is_err());
    }
}
