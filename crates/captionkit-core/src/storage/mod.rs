//! Storage collaborators: a local key-value store for the design record and
//! a remote blob store for image bytes.

mod autosave;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local_storage;

pub use autosave::{AutoSaveManager, DEFAULT_DEBOUNCE_MS, UploadGuard};
pub use memory::{MemoryBlobStore, MemoryKeyValueStore};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileKeyValueStore;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageStore;

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage quota exceeded: {size} bytes (limit {limit})")]
    QuotaExceeded { size: usize, limit: usize },
    #[error("Remote storage error: {0}")]
    Remote(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Synchronous, size-limited local store (browser `localStorage` or a file).
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value. Fails with [`StorageError::QuotaExceeded`] when full.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Synchronous, size-limited local store (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait KeyValueStore {
    /// Read a value.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value. Fails with [`StorageError::QuotaExceeded`] when full.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Remote object storage for image bytes.
#[cfg(not(target_arch = "wasm32"))]
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning the new blob's path.
    fn upload(&self, bytes: Vec<u8>, content_type: &str) -> BoxFuture<'_, StorageResult<String>>;

    /// Fetch the bytes stored at `path`.
    fn download(&self, path: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>>;

    /// Delete the blob at `path`.
    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Public URL a canvas can load directly.
    fn public_url(&self, path: &str) -> String;
}

/// Remote object storage for image bytes (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait BlobStore {
    /// Store bytes, returning the new blob's path.
    fn upload(&self, bytes: Vec<u8>, content_type: &str) -> BoxFuture<'_, StorageResult<String>>;

    /// Fetch the bytes stored at `path`.
    fn download(&self, path: &str) -> BoxFuture<'_, StorageResult<Vec<u8>>>;

    /// Delete the blob at `path`.
    fn delete(&self, path: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Public URL a canvas can load directly.
    fn public_url(&self, path: &str) -> String;
}
