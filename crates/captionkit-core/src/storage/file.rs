//! File-based key-value store for native platforms.

use super::{KeyValueStore, StorageError, StorageResult};
use std::fs;
use std::path::PathBuf;

/// File-based key-value store for native platforms.
///
/// Each key is stored as a JSON file in a directory. The quota mirrors the
/// few-megabyte ceiling of browser storage so native and web builds fail the
/// same way.
pub struct FileKeyValueStore {
    /// Base directory for stored values.
    base_path: PathBuf,
    /// Maximum size of a single value in bytes.
    quota: usize,
}

impl FileKeyValueStore {
    /// Create a store in the given directory, creating it if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self {
            base_path,
            quota: super::memory::DEFAULT_QUOTA_BYTES,
        })
    }

    /// Create the store in the default location.
    ///
    /// On Unix: `~/.local/share/captionkit/`
    /// On Windows: `%LOCALAPPDATA%\captionkit\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("captionkit"))
    }

    /// Set the per-value size limit.
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }

    /// Get the file path for a key.
    fn value_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be safe for filenames
        let safe_key: String = key
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    /// Get the base path.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.value_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        if value.len() > self.quota {
            return Err(StorageError::QuotaExceeded {
                size: value.len(),
                limit: self.quota,
            });
        }
        let path = self.value_path(key);
        fs::write(&path, value)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.value_path(key);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_set_get() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();

        store.set("captionkit.design", "{\"textLayers\":[]}").unwrap();
        assert_eq!(
            store.get("captionkit.design").unwrap().as_deref(),
            Some("{\"textLayers\":[]}")
        );
    }

    #[test]
    fn test_file_store_missing() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_file_store_remove() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();

        store.set("k", "v").unwrap();
        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
        // Removing again is fine
        store.remove("k").unwrap();
    }

    #[test]
    fn test_file_store_sanitizes_key() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf()).unwrap();

        store.set("a/b:c*d", "v").unwrap();
        assert_eq!(store.get("a/b:c*d").unwrap().as_deref(), Some("v"));
        assert!(dir.path().join("a_b_c_d.json").exists());
    }

    #[test]
    fn test_file_store_quota() {
        let dir = tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().to_path_buf())
            .unwrap()
            .with_quota(4);

        assert!(matches!(
            store.set("k", "too long"),
            Err(StorageError::QuotaExceeded { size: 8, limit: 4 })
        ));
        assert_eq!(store.get("k").unwrap(), None);
    }
}
