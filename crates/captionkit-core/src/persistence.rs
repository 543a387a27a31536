//! Persistence adapter: the saved design record and the stores behind it.
//!
//! The design is written as one JSON record under a fixed key in a local
//! [`KeyValueStore`]. Background image bytes go to an optional remote
//! [`BlobStore`]; when it is configured only the pointer is written locally.

use crate::background::{BackgroundImage, DecodedImage, ImageFormat, decode_data_url, encode_data_url};
use crate::config::EditorConfig;
use crate::design::DesignState;
use crate::layer::TextLayer;
use crate::storage::{BlobStore, KeyValueStore, StorageError, StorageResult};
use kurbo::Size;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The persisted design record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedDesign {
    /// Inline data URL or public URL of the remote blob.
    pub background_image: Option<String>,
    /// Remote blob identifier, when the image lives in the blob store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_image_path: Option<String>,
    #[serde(default)]
    pub text_layers: Vec<TextLayer>,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl PersistedDesign {
    /// Build the record for a design.
    pub fn from_state(state: &DesignState) -> Self {
        let (background_image, background_image_path) = match &state.background {
            None => (None, None),
            Some(BackgroundImage::Inline { data_url }) => (Some(data_url.clone()), None),
            Some(BackgroundImage::Remote { path, url }) => (Some(url.clone()), Some(path.clone())),
            Some(BackgroundImage::Linked { url }) => (Some(url.clone()), None),
        };
        Self {
            background_image,
            background_image_path,
            text_layers: state.text_layers.clone(),
            canvas_width: state.canvas_width,
            canvas_height: state.canvas_height,
        }
    }

    /// Rebuild a design. Invalid canvas dimensions fall back to `default_size`.
    pub fn into_state(self, default_size: Size) -> DesignState {
        let background = match (self.background_image, self.background_image_path) {
            (url, Some(path)) => Some(BackgroundImage::Remote {
                url: url.unwrap_or_default(),
                path,
            }),
            (Some(data), None) if data.starts_with("data:") => Some(BackgroundImage::Inline { data_url: data }),
            (Some(url), None) if !url.is_empty() => {
                log::debug!("Saved background has no blob path, keeping {} as a link", url);
                Some(BackgroundImage::Linked { url })
            }
            _ => None,
        };

        let valid = |v: f64| v.is_finite() && v > 0.0;
        let (canvas_width, canvas_height) = if valid(self.canvas_width) && valid(self.canvas_height) {
            (self.canvas_width, self.canvas_height)
        } else {
            (default_size.width, default_size.height)
        };

        let mut text_layers: Vec<TextLayer> = Vec::with_capacity(self.text_layers.len());
        for layer in self.text_layers {
            if text_layers.iter().any(|l| l.id == layer.id) {
                log::warn!("Dropping duplicate layer {} from saved design", layer.id);
                continue;
            }
            text_layers.push(layer);
        }

        DesignState {
            background,
            text_layers,
            canvas_width,
            canvas_height,
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// What a save did besides writing the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOutcome {
    /// Remote pointer created for an inline background during this save.
    pub adopted: Option<BackgroundImage>,
    /// The background was left out of the record (too large or over quota).
    pub dropped_background: bool,
}

/// Writes and reads the design record, coordinating with the blob store.
pub struct PersistenceAdapter {
    local: Arc<dyn KeyValueStore>,
    remote: Option<Arc<dyn BlobStore>>,
    key: String,
    max_inline_bytes: usize,
    /// Last inline image uploaded by a save, and the pointer it became.
    last_upload: Option<(String, BackgroundImage)>,
}

impl PersistenceAdapter {
    /// Create an adapter writing under `key`.
    pub fn new(local: Arc<dyn KeyValueStore>, key: impl Into<String>, max_inline_bytes: usize) -> Self {
        Self {
            local,
            remote: None,
            key: key.into(),
            max_inline_bytes,
            last_upload: None,
        }
    }

    /// Create an adapter from the editor configuration.
    pub fn from_config(
        local: Arc<dyn KeyValueStore>,
        remote: Option<Arc<dyn BlobStore>>,
        config: &EditorConfig,
    ) -> Self {
        let adapter = Self::new(local, config.storage_key.clone(), config.max_inline_image_bytes);
        match remote {
            Some(remote) => adapter.with_remote(remote),
            None => adapter,
        }
    }

    /// Attach a remote blob store.
    pub fn with_remote(mut self, remote: Arc<dyn BlobStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Check if a remote blob store is configured.
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Key the record is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write `state` to the local store.
    ///
    /// With a remote store, an inline background is uploaded first (once per
    /// image) and only the pointer is written. Without one, the inline data is
    /// written unless it is too large, in which case the layers are saved
    /// without it.
    pub async fn save(&mut self, state: &DesignState) -> StorageResult<SaveOutcome> {
        let mut outcome = SaveOutcome::default();
        let mut record = PersistedDesign::from_state(state);

        if let Some(BackgroundImage::Inline { data_url }) = &state.background {
            if let Some(pointer) = self.upload_inline(data_url).await {
                record.background_image = Some(pointer.source().to_string());
                record.background_image_path = pointer.path().map(str::to_string);
                outcome.adopted = Some(pointer);
            } else if self.inline_too_large(data_url) {
                log::warn!(
                    "Background image exceeds {} bytes, saving design without it",
                    self.max_inline_bytes
                );
                record.background_image = None;
                outcome.dropped_background = true;
            }
        }

        let json = record
            .to_json()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        match self.local.set(&self.key, &json) {
            Ok(()) => {}
            Err(StorageError::QuotaExceeded { size, limit })
                if record.background_image_path.is_none() && record.background_image.is_some() =>
            {
                log::warn!(
                    "Saved design too large ({} bytes, limit {}), retrying without background",
                    size,
                    limit
                );
                record.background_image = None;
                let json = record
                    .to_json()
                    .map_err(|e| StorageError::Serialization(e.to_string()))?;
                self.local.set(&self.key, &json)?;
                outcome.dropped_background = true;
            }
            Err(e) => return Err(e),
        }

        log::debug!("Saved design with {} layers", record.text_layers.len());
        Ok(outcome)
    }

    /// Read the saved design. Missing or unreadable records mean a cold start.
    pub fn load(&self, default_size: Size) -> Option<DesignState> {
        let json = match self.local.get(&self.key) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read saved design: {}", e);
                return None;
            }
        };
        let record = match PersistedDesign::from_json(&json) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Saved design is corrupt, starting fresh: {}", e);
                return None;
            }
        };

        let mut state = record.into_state(default_size);
        if let (Some(remote), Some(BackgroundImage::Remote { path, url })) =
            (&self.remote, state.background.as_mut())
        {
            *url = remote.public_url(path);
        }
        log::info!("Restored saved design with {} layers", state.text_layers.len());
        Some(state)
    }

    /// Upload a freshly imported image.
    ///
    /// Returns `Ok(None)` when no remote store is configured.
    pub async fn upload_background(&mut self, image: &DecodedImage) -> StorageResult<Option<BackgroundImage>> {
        let Some(remote) = self.remote.clone() else {
            return Ok(None);
        };
        let path = remote
            .upload(image.bytes.clone(), image.format.mime_type())
            .await?;
        let pointer = BackgroundImage::remote(path.clone(), remote.public_url(&path));
        self.last_upload = Some((encode_data_url(&image.bytes, image.format), pointer.clone()));
        log::info!("Uploaded background image to {}", path);
        Ok(Some(pointer))
    }

    /// Delete a remote blob. Failures are logged only.
    pub async fn delete_remote(&mut self, path: &str) -> bool {
        if self
            .last_upload
            .as_ref()
            .is_some_and(|(_, pointer)| pointer.path() == Some(path))
        {
            self.last_upload = None;
        }
        let Some(remote) = self.remote.clone() else {
            return false;
        };
        match remote.delete(path).await {
            Ok(()) => {
                log::info!("Deleted background blob {}", path);
                true
            }
            Err(e) => {
                log::warn!("Failed to delete background blob {}: {}", path, e);
                false
            }
        }
    }

    /// Download a blob and wrap it as a data URL.
    ///
    /// Returns `Ok(None)` when no remote store is configured.
    pub async fn fetch_as_data_url(&self, path: &str) -> StorageResult<Option<String>> {
        let Some(remote) = self.remote.clone() else {
            return Ok(None);
        };
        let bytes = remote.download(path).await?;
        let format = ImageFormat::from_magic_bytes(&bytes)
            .ok_or_else(|| StorageError::Serialization(format!("{} is not an image", path)))?;
        Ok(Some(encode_data_url(&bytes, format)))
    }

    /// Remove the saved record.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.last_upload = None;
        self.local.remove(&self.key)
    }

    /// Upload inline data to the remote store, reusing the previous pointer
    /// for the same image.
    async fn upload_inline(&mut self, data_url: &str) -> Option<BackgroundImage> {
        let remote = self.remote.clone()?;
        if let Some((uploaded, pointer)) = &self.last_upload {
            if uploaded == data_url {
                return Some(pointer.clone());
            }
        }
        let (format, bytes) = decode_data_url(data_url)?;
        match remote.upload(bytes, format.mime_type()).await {
            Ok(path) => {
                let pointer = BackgroundImage::remote(path.clone(), remote.public_url(&path));
                self.last_upload = Some((data_url.to_string(), pointer.clone()));
                log::info!("Uploaded inline background to {}", path);
                Some(pointer)
            }
            Err(e) => {
                log::warn!("Background upload failed, keeping it inline: {}", e);
                None
            }
        }
    }

    fn inline_too_large(&self, data_url: &str) -> bool {
        decode_data_url(data_url).is_none_or(|(_, bytes)| bytes.len() > self.max_inline_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBlobStore, MemoryKeyValueStore};
    use kurbo::Point;
    use pollster::block_on;
    use pretty_assertions::assert_eq;

    const DEFAULT: Size = Size::new(800.0, 600.0);

    fn png_data_url() -> String {
        // Magic bytes are enough for the data URL round trip
        encode_data_url(b"\x89PNG\r\n\x1a\n0000", ImageFormat::Png)
    }

    fn design(background: Option<BackgroundImage>) -> DesignState {
        let mut state = DesignState::new(DEFAULT);
        state.background = background;
        state
            .text_layers
            .push(TextLayer::new(Point::new(10.0, 20.0)).with_text("Hello\nworld"));
        state.text_layers.push(TextLayer::new(Point::new(30.0, 40.0)));
        state
    }

    fn local_only(local: &Arc<MemoryKeyValueStore>) -> PersistenceAdapter {
        PersistenceAdapter::new(local.clone(), "design", 1024)
    }

    #[test]
    fn test_wire_format_field_names() {
        let state = design(Some(BackgroundImage::remote("bg/a.png", "https://cdn/bg/a.png")));
        let json = PersistedDesign::from_state(&state).to_json().unwrap();
        for field in [
            "\"backgroundImage\":\"https://cdn/bg/a.png\"",
            "\"backgroundImagePath\":\"bg/a.png\"",
            "\"textLayers\"",
            "\"canvasWidth\":800.0",
            "\"canvasHeight\":600.0",
            "\"fontFamily\"",
            "\"alignment\":\"center\"",
        ] {
            assert!(json.contains(field), "missing {} in {}", field, json);
        }
    }

    #[test]
    fn test_null_background_has_no_path() {
        let json = PersistedDesign::from_state(&design(None)).to_json().unwrap();
        assert!(json.contains("\"backgroundImage\":null"));
        assert!(!json.contains("backgroundImagePath"));
    }

    #[test]
    fn test_save_load_round_trip() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        let mut adapter = local_only(&local).with_remote(remote.clone());

        let state = design(Some(BackgroundImage::remote(
            "bg/a.png",
            remote.public_url("bg/a.png"),
        )));
        let outcome = block_on(adapter.save(&state)).unwrap();
        assert_eq!(outcome, SaveOutcome::default());

        let loaded = adapter.load(DEFAULT).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_round_trip_without_layers() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        let mut adapter = local_only(&local).with_remote(remote.clone());

        let mut state = DesignState::new(Size::new(640.0, 480.0));
        state.background = Some(BackgroundImage::remote("bg/empty.png", remote.public_url("bg/empty.png")));
        block_on(adapter.save(&state)).unwrap();

        let loaded = adapter.load(DEFAULT).unwrap();
        assert!(loaded.text_layers.is_empty());
        assert_eq!(loaded, state);
    }

    #[test]
    fn test_url_without_path_is_kept_as_link() {
        let json = r#"{"backgroundImage":"https://cdn.example/bg.png","textLayers":[],"canvasWidth":800,"canvasHeight":600}"#;
        let state = PersistedDesign::from_json(json).unwrap().into_state(DEFAULT);
        let background = state.background.clone().unwrap();
        assert_eq!(
            background,
            BackgroundImage::Linked {
                url: "https://cdn.example/bg.png".to_string()
            }
        );
        assert_eq!(background.path(), None);
        assert_eq!(background.source(), "https://cdn.example/bg.png");

        let record = PersistedDesign::from_state(&state);
        assert_eq!(record.background_image.as_deref(), Some("https://cdn.example/bg.png"));
        assert_eq!(record.background_image_path, None);
    }

    #[test]
    fn test_load_missing_is_cold_start() {
        let local = Arc::new(MemoryKeyValueStore::new());
        assert!(local_only(&local).load(DEFAULT).is_none());
    }

    #[test]
    fn test_load_corrupt_is_cold_start() {
        let local = Arc::new(MemoryKeyValueStore::new());
        local.set("design", "{not json").unwrap();
        assert!(local_only(&local).load(DEFAULT).is_none());
    }

    #[test]
    fn test_load_fixes_bad_dimensions_and_duplicates() {
        let state = design(None);
        let mut record = PersistedDesign::from_state(&state);
        record.canvas_width = -1.0;
        record.text_layers.push(record.text_layers[0].clone());

        let restored = record.into_state(DEFAULT);
        assert_eq!(restored.canvas_size(), DEFAULT);
        assert_eq!(restored.text_layers.len(), 2);
    }

    #[test]
    fn test_load_refreshes_public_url() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::new("https://new.example"));
        let mut adapter = local_only(&local).with_remote(remote);

        let state = design(Some(BackgroundImage::remote("bg/a.png", "https://old.example/bg/a.png")));
        block_on(adapter.save(&state)).unwrap();

        let loaded = adapter.load(DEFAULT).unwrap();
        assert_eq!(
            loaded.background,
            Some(BackgroundImage::remote("bg/a.png", "https://new.example/bg/a.png"))
        );
    }

    #[test]
    fn test_inline_saved_locally_without_remote() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut adapter = local_only(&local);
        let state = design(Some(BackgroundImage::Inline {
            data_url: png_data_url(),
        }));

        let outcome = block_on(adapter.save(&state)).unwrap();
        assert!(!outcome.dropped_background);
        assert_eq!(adapter.load(DEFAULT).unwrap(), state);
    }

    #[test]
    fn test_too_large_inline_is_dropped() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut adapter = PersistenceAdapter::new(local.clone(), "design", 4);
        let state = design(Some(BackgroundImage::Inline {
            data_url: png_data_url(),
        }));

        let outcome = block_on(adapter.save(&state)).unwrap();
        assert!(outcome.dropped_background);
        let loaded = adapter.load(DEFAULT).unwrap();
        assert_eq!(loaded.background, None);
        assert_eq!(loaded.text_layers, state.text_layers);
    }

    #[test]
    fn test_quota_exceeded_drops_background() {
        let state = design(Some(BackgroundImage::Inline {
            data_url: png_data_url(),
        }));
        let without_image = PersistedDesign {
            background_image: None,
            ..PersistedDesign::from_state(&state)
        };
        let quota = "design".len() + without_image.to_json().unwrap().len();
        let local = Arc::new(MemoryKeyValueStore::with_quota(quota));
        let mut adapter = PersistenceAdapter::new(local.clone(), "design", 1024);

        let outcome = block_on(adapter.save(&state)).unwrap();
        assert!(outcome.dropped_background);
        assert_eq!(adapter.load(DEFAULT).unwrap().text_layers.len(), 2);
    }

    #[test]
    fn test_inline_uploaded_once() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        let mut adapter = local_only(&local).with_remote(remote.clone());
        let state = design(Some(BackgroundImage::Inline {
            data_url: png_data_url(),
        }));

        let first = block_on(adapter.save(&state)).unwrap();
        let second = block_on(adapter.save(&state)).unwrap();
        assert_eq!(remote.upload_count(), 1);
        assert!(first.adopted.is_some());
        assert_eq!(first.adopted, second.adopted);

        let loaded = adapter.load(DEFAULT).unwrap();
        assert!(loaded.background.unwrap().is_remote());
    }

    #[test]
    fn test_failed_upload_keeps_inline() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        remote.set_fail_uploads(true);
        let mut adapter = local_only(&local).with_remote(remote);
        let state = design(Some(BackgroundImage::Inline {
            data_url: png_data_url(),
        }));

        let outcome = block_on(adapter.save(&state)).unwrap();
        assert_eq!(outcome.adopted, None);
        assert_eq!(adapter.load(DEFAULT).unwrap().background, state.background);
    }

    #[test]
    fn test_delete_remote_is_best_effort() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        let mut adapter = local_only(&local).with_remote(remote.clone());
        let path = block_on(remote.upload(vec![1], "image/png")).unwrap();

        remote.set_fail_deletes(true);
        assert!(!block_on(adapter.delete_remote(&path)));
        remote.set_fail_deletes(false);
        assert!(block_on(adapter.delete_remote(&path)));
        assert!(remote.is_empty());
    }

    #[test]
    fn test_fetch_as_data_url() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let remote = Arc::new(MemoryBlobStore::default());
        let adapter = local_only(&local).with_remote(remote.clone());
        let bytes = b"\x89PNG\r\n\x1a\n0000".to_vec();
        let path = block_on(remote.upload(bytes.clone(), "image/png")).unwrap();

        let data_url = block_on(adapter.fetch_as_data_url(&path)).unwrap().unwrap();
        assert_eq!(decode_data_url(&data_url), Some((ImageFormat::Png, bytes)));

        let no_remote = local_only(&local);
        assert_eq!(block_on(no_remote.fetch_as_data_url(&path)).unwrap(), None);
    }

    #[test]
    fn test_clear() {
        let local = Arc::new(MemoryKeyValueStore::new());
        let mut adapter = local_only(&local);
        block_on(adapter.save(&design(None))).unwrap();
        adapter.clear().unwrap();
        assert!(adapter.load(DEFAULT).is_none());
    }
}
