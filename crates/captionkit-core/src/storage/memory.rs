//! In-memory storage implementations.

use super::{BlobStore, BoxFuture, KeyValueStore, StorageError, StorageResult};
use crate::background::ImageFormat;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use uuid::Uuid;

/// Default quota, roughly what browsers grant `localStorage`.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// In-memory key-value store for testing and ephemeral use.
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
    quota: usize,
    writes: AtomicUsize,
}

impl Default for MemoryKeyValueStore {
    fn default() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }
}

impl MemoryKeyValueStore {
    /// Create a new empty store with the default quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding at most `quota` bytes of keys and values.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
            quota,
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        let others: usize = values
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let size = others + key.len() + value.len();
        if size > self.quota {
            return Err(StorageError::QuotaExceeded {
                size,
                limit: self.quota,
            });
        }
        values.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        values.remove(key);
        Ok(())
    }
}

/// In-memory blob store with failure injection for tests.
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    base_url: String,
    uploads: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://blobs")
    }
}

impl MemoryBlobStore {
    /// Create an empty store whose public URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            base_url: base_url.into(),
            uploads: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Make subsequent uploads fail.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent downloads fail.
    pub fn set_fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::Relaxed);
    }

    /// Make subsequent deletes fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }

    /// Number of successful uploads.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::Relaxed)
    }

    /// Check if a blob exists.
    pub fn contains(&self, path: &str) -> bool {
        self.blobs
            .read()
            .map(|blobs| blobs.contains_key(path))
            .unwrap_or(false)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn upload(&self, bytes: Vec<u8>, content_type: &str) -> BoxFuture<'_, StorageResult<String>> {
        let extension = match ImageFormat::from_mime_type(content_type) {
            Some(ImageFormat::Png) => "png",
            Some(ImageFormat::Jpeg) => "jpg",
            Some(ImageFormat::WebP) => "webp",
            None => "bin",
        };
        let path = format!("backgrounds/{}.{}", Uuid::new_v4(), extension);
        Box::pin(async move {
            if self.fail_uploads.load(Ordering::Relaxed) {
                return Err(StorageError::Remote("upload rejected".to_string()));
            }
            let mut blobs = self
                .blobs
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            blobs.insert(path.clone(), bytes);
            self.uploads.fetch_add(1, Ordering::Relaxed);
            Ok(path)
        })
    }

    fn download(&self, path: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>> {
        let path = path.to_string();
        Box::pin(async move {
            if self.fail_downloads.load(Ordering::Relaxed) {
                return Err(StorageError::Remote("download rejected".to_string()));
            }
            let blobs = self
                .blobs
                .read()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            blobs.get(&path).cloned().ok_or(StorageError::NotFound(path))
        })
    }

    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = path.to_string();
        Box::pin(async move {
            if self.fail_deletes.load(Ordering::Relaxed) {
                return Err(StorageError::Remote("delete rejected".to_string()));
            }
            let mut blobs = self
                .blobs
                .write()
                .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
            blobs.remove(&path);
            Ok(())
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
