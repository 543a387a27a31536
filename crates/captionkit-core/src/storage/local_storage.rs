//! `window.localStorage` key-value store for WebAssembly.

use super::{KeyValueStore, StorageError, StorageResult};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{DomException, Storage};

/// Key-value store backed by the browser's `localStorage`.
///
/// Note: This is intentionally not Send/Sync since WASM is single-threaded
/// and `Storage` handles are not thread-safe.
pub struct LocalStorageStore {
    storage: Storage,
}

impl LocalStorageStore {
    /// Open the window's `localStorage`.
    pub fn new() -> StorageResult<Self> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Other("No window object".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| StorageError::Other(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Other("localStorage not available".to_string()))?;
        Ok(Self { storage })
    }
}

/// Map a thrown JS value, recognising the browser's quota exception.
fn storage_error(error: JsValue, size: usize) -> StorageError {
    match error.dyn_ref::<DomException>() {
        Some(exception) if exception.name() == "QuotaExceededError" => {
            StorageError::QuotaExceeded { size, limit: 0 }
        }
        _ => StorageError::Io(format!("{:?}", error)),
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.storage.get_item(key).map_err(|e| storage_error(e, 0))
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.storage
            .set_item(key, value)
            .map_err(|e| storage_error(e, value.len()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.storage.remove_item(key).map_err(|e| storage_error(e, 0))
    }
}
