//! The editor: design store, history, canvas binding and autosave wired
//! around one canvas runtime.
//!
//! All methods run on the UI event loop. Time-driven work (surface retries,
//! autosave debounce) is driven by the host calling [`Editor::poll`] and
//! [`Editor::autosave`] with the current instant.

use crate::Instant;
use crate::background::{BackgroundImage, DecodedImage};
use crate::binding::{CanvasBinding, CanvasError, CanvasEvent, CanvasRuntime, LoadFailure, LoadPoll, LoadToken, NUDGE_STEP, NudgeDirection};
use crate::config::EditorConfig;
use crate::design::{DesignState, DesignStore, ReorderDirection};
use crate::error::{EditorError, EditorResult};
use crate::fonts::{FontCatalog, fallback_fonts, load_font_families};
use crate::history::History;
use crate::layer::{LayerId, LayerPatch, TextLayer};
use crate::persistence::PersistenceAdapter;
use crate::storage::AutoSaveManager;
use kurbo::Size;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The requested action could not be completed.
    Error,
    /// The action went through in a degraded way.
    Warning,
}

/// A message for the user, queued until the host takes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Image/text composition editor bound to a canvas runtime.
pub struct Editor<C: CanvasRuntime> {
    canvas: C,
    config: EditorConfig,
    store: DesignStore,
    history: History<DesignState>,
    binding: CanvasBinding,
    autosave: AutoSaveManager,
    fonts: Vec<String>,
    notices: Vec<Notice>,
    /// Cross-origin fallback waiting for [`Editor::process_pending`].
    pending_fetch: Option<(LoadToken, String)>,
    /// Replaced blobs kept until a newer pointer is stored.
    stale_blobs: Vec<String>,
}

impl<C: CanvasRuntime> Editor<C> {
    /// Create an editor with an empty design.
    pub fn new(mut canvas: C, config: EditorConfig, adapter: PersistenceAdapter) -> Self {
        let store = DesignStore::from_config(&config);
        let binding = CanvasBinding::new(
            config.surface_retry_attempts,
            config.surface_retry_delay(),
            config.snap_threshold,
        );
        let autosave = AutoSaveManager::new(adapter, config.autosave_debounce());
        let mut history = History::new(config.history_depth);
        history.record(store.snapshot());
        canvas.resize(store.state().canvas_size());

        Self {
            canvas,
            store,
            history,
            binding,
            autosave,
            fonts: fallback_fonts(),
            notices: Vec::new(),
            pending_fetch: None,
            stale_blobs: Vec::new(),
            config,
        }
    }

    /// Restore the saved design, if there is one. Returns true if restored.
    pub fn restore_saved(&mut self, now: Instant) -> bool {
        let Some(state) = self.autosave.load(self.config.default_canvas_size) else {
            return false;
        };
        self.history.clear();
        self.history.record(state.clone());
        self.restore(state, now);
        true
    }

    /// Load the font catalog, falling back to a fixed list on failure.
    pub async fn load_fonts<F: FontCatalog + ?Sized>(&mut self, catalog: &F) {
        self.fonts = load_font_families(catalog).await;
    }

    /// Font families offered in the property panel.
    pub fn fonts(&self) -> &[String] {
        &self.fonts
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// The current design.
    pub fn state(&self) -> &DesignState {
        self.store.state()
    }

    pub fn store(&self) -> &DesignStore {
        &self.store
    }

    pub fn history(&self) -> &History<DesignState> {
        &self.history
    }

    pub fn autosave_manager(&self) -> &AutoSaveManager {
        &self.autosave
    }

    /// Selected layer id.
    pub fn selected(&self) -> Option<LayerId> {
        self.store.selected()
    }

    /// Selected layer, the one the property panel edits.
    pub fn selected_layer(&self) -> Option<&TextLayer> {
        self.store.selected_layer()
    }

    /// Drain queued user notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // --- Layer operations ---

    /// Add a default layer on top, centered, and select it.
    pub fn add_text_layer(&mut self, now: Instant) -> LayerId {
        let id = self.store.add_text_layer();
        if let Some(layer) = self.store.layer(id) {
            self.binding.attach_layer(&mut self.canvas, layer);
        }
        self.store.select(id);
        self.canvas.request_render();
        self.commit(now);
        log::debug!("Added text layer {}", id);
        id
    }

    /// Apply a property-panel edit to a layer.
    ///
    /// Returns whether anything changed. Panel edits do not create history
    /// entries by themselves; see [`Self::checkpoint`].
    pub fn update_text_layer(&mut self, id: LayerId, patch: LayerPatch, now: Instant) -> EditorResult<bool> {
        let patch = patch.sanitized(self.config.min_font_size, self.config.max_font_size);
        self.apply_patch(id, &patch, true, now)
    }

    /// Delete a layer and its canvas object.
    pub fn delete_text_layer(&mut self, id: LayerId, now: Instant) -> EditorResult<()> {
        if self.store.delete_text_layer(id).is_none() {
            log::debug!("Delete of unknown layer {} ignored", id);
            return Err(EditorError::NotFound(id));
        }
        self.binding.detach_layer(&mut self.canvas, id);
        self.canvas.request_render();
        self.commit(now);
        Ok(())
    }

    /// Move a layer one step in z-order. Returns false at the boundary.
    pub fn reorder_layer(&mut self, id: LayerId, direction: ReorderDirection, now: Instant) -> bool {
        if !self.store.reorder_layer(id, direction) {
            return false;
        }
        self.binding
            .sync_z_order(&mut self.canvas, &self.store.state().text_layers);
        self.canvas.request_render();
        self.commit(now);
        true
    }

    /// Select a layer. Returns false if it does not exist.
    pub fn select_layer(&mut self, id: LayerId) -> bool {
        self.store.select(id)
    }

    /// Clear selection.
    pub fn clear_selection(&mut self) {
        self.store.clear_selection();
    }

    /// Move the selected layer by one step. Returns false without a selection.
    pub fn nudge(&mut self, direction: NudgeDirection, now: Instant) -> bool {
        let Some(layer) = self.store.selected_layer() else {
            return false;
        };
        let id = layer.id;
        let position = layer.position() + direction.delta(NUDGE_STEP);
        self.apply_patch(id, &LayerPatch::position(position), true, now)
            .unwrap_or(false)
    }

    // --- Background ---

    /// Import an uploaded image as the new background.
    ///
    /// Invalid files are rejected before anything changes. With a remote
    /// store the image is uploaded first; if that fails the image is used
    /// inline and the user is warned. The previous remote blob is deleted
    /// once the new background is stored remotely; after an inline fallback
    /// it is kept until a later save moves the image to remote storage.
    pub async fn import_background(&mut self, bytes: Vec<u8>, now: Instant) -> EditorResult<Size> {
        let image = match DecodedImage::decode(bytes) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("Rejected background upload: {}", e);
                self.notify(NoticeLevel::Error, e.to_string());
                return Err(e);
            }
        };

        let uploaded = {
            let _uploading = self.autosave.upload_guard();
            self.autosave.adapter_mut().upload_background(&image).await
        };

        let background = match uploaded {
            Ok(Some(pointer)) => pointer,
            Ok(None) => BackgroundImage::inline(&image.bytes, image.format),
            Err(e) => {
                log::warn!("Background upload failed, using image locally: {}", e);
                self.notify(
                    NoticeLevel::Warning,
                    "The image could not be uploaded. It is available for editing but not saved remotely.",
                );
                BackgroundImage::inline(&image.bytes, image.format)
            }
        };

        let previous = self.background_path();
        let size = self
            .store
            .set_background_image(background.clone(), image.size());
        self.canvas.resize(size);
        self.binding.begin_epoch();
        self.pending_fetch = None;
        self.binding.request_background(&background, now);
        self.poll(now);
        self.commit(now);

        if let Some(path) = previous {
            if background.path() != Some(path.as_str()) {
                self.stale_blobs.push(path);
            }
        }
        if background.is_remote() {
            self.delete_stale_blobs().await;
        } else if !self.stale_blobs.is_empty() {
            log::debug!("Keeping {} replaced blob(s) until the new image is stored", self.stale_blobs.len());
        }
        log::info!("Background set, canvas {}x{}", size.width, size.height);
        Ok(size)
    }

    /// Clear layers, background, selection and history.
    ///
    /// The remote blob of the old background is deleted best-effort.
    pub async fn reset_design(&mut self, now: Instant) {
        let previous = self.background_path();
        self.store.reset();
        self.binding.begin_epoch();
        self.pending_fetch = None;
        self.binding.rebuild(&mut self.canvas, self.store.state());
        self.history.clear();
        self.history.record(self.store.snapshot());
        self.autosave.mark_dirty(now);

        if let Some(path) = previous {
            self.stale_blobs.push(path);
        }
        self.delete_stale_blobs().await;
        log::info!("Design reset");
    }

    // --- History ---

    /// Record the current design if it differs from the last snapshot.
    ///
    /// Call at natural breakpoints such as the end of a panel edit.
    pub fn checkpoint(&mut self) -> bool {
        if self.history.current() == Some(self.store.state()) {
            return false;
        }
        self.history.record(self.store.snapshot());
        true
    }

    /// Step back one snapshot. Returns false if there is nothing to undo.
    pub fn undo(&mut self, now: Instant) -> bool {
        // Uncommitted edits become redoable
        self.checkpoint();
        let Some(state) = self.history.undo().cloned() else {
            return false;
        };
        self.restore(state, now);
        self.autosave.mark_dirty(now);
        true
    }

    /// Step forward one snapshot. Returns false if there is nothing to redo.
    pub fn redo(&mut self, now: Instant) -> bool {
        let Some(state) = self.history.redo().cloned() else {
            return false;
        };
        self.restore(state, now);
        self.autosave.mark_dirty(now);
        true
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.history.current() != Some(self.store.state())
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // --- Canvas events ---

    /// Apply a gesture or load result reported by the canvas.
    pub fn handle_event(&mut self, event: CanvasEvent, now: Instant) {
        match event {
            CanvasEvent::TextChanged { key, text } => {
                if let Some(id) = self.binding.layer_for(&self.canvas, key) {
                    let _ = self.apply_patch(id, &LayerPatch::text(text), false, now);
                }
            }
            CanvasEvent::Moving { key, origin, center } => {
                self.binding.snap_drag(&mut self.canvas, key, origin, center);
            }
            CanvasEvent::Moved { key, origin } => {
                if let Some(id) = self.binding.layer_for(&self.canvas, key) {
                    let _ = self.apply_patch(id, &LayerPatch::position(origin), false, now);
                }
            }
            CanvasEvent::Rotated { key, degrees } => {
                if let Some(id) = self.binding.layer_for(&self.canvas, key) {
                    let _ = self.apply_patch(id, &LayerPatch::rotation(degrees), false, now);
                }
            }
            CanvasEvent::Selected { key } => match self.binding.layer_for(&self.canvas, key) {
                Some(id) => {
                    self.store.select(id);
                }
                None => self.store.clear_selection(),
            },
            CanvasEvent::SelectionCleared => self.store.clear_selection(),
            CanvasEvent::KeyPressed { key } => {
                if let Some(direction) = NudgeDirection::from_key(&key) {
                    self.nudge(direction, now);
                }
            }
            CanvasEvent::ImageLoaded { token, width, height } => {
                let source = Size::new(width as f64, height as f64);
                let max = self.store.max_canvas_size();
                if let Some(size) = self
                    .binding
                    .on_image_loaded(&mut self.canvas, token, source, max)
                {
                    if size != self.store.state().canvas_size() {
                        self.store.set_canvas_size(size);
                        self.autosave.mark_dirty(now);
                    }
                }
            }
            CanvasEvent::ImageLoadFailed {
                token,
                cross_origin,
                message,
            } => match self.binding.on_image_failed(token, cross_origin) {
                LoadFailure::Stale => log::debug!("Ignoring failure of stale load: {}", message),
                LoadFailure::FetchBytes { token, path } if self.autosave.adapter().has_remote() => {
                    log::info!("Cross-origin load failed, fetching {} directly", path);
                    self.pending_fetch = Some((token, path));
                }
                LoadFailure::FetchBytes { path, .. } => {
                    log::warn!("Cannot fetch {}: blob storage is not configured", path);
                    self.binding.cancel_background();
                    self.background_failed(&message);
                }
                LoadFailure::Failed => {
                    log::warn!("Background image failed to load: {}", message);
                    self.background_failed(&message);
                }
            },
        }
    }

    /// Drive time-based work: background loads waiting for the canvas surface.
    pub fn poll(&mut self, now: Instant) -> LoadPoll {
        let result = self.binding.poll_background(&mut self.canvas, now);
        if result == LoadPoll::GaveUp {
            self.notify(
                NoticeLevel::Error,
                "The canvas is not ready. The background image could not be displayed.",
            );
        }
        result
    }

    /// Check if a cross-origin fallback fetch is waiting.
    pub fn has_pending_fetch(&self) -> bool {
        self.pending_fetch.is_some()
    }

    /// Run the queued cross-origin fallback: fetch the blob bytes and retry
    /// the load with inline data. Returns true if a retry was queued.
    pub async fn process_pending(&mut self, now: Instant) -> bool {
        let Some((token, path)) = self.pending_fetch.take() else {
            return false;
        };
        let fetched = self.autosave.adapter().fetch_as_data_url(&path).await;
        match fetched {
            Ok(Some(data_url)) => {
                if self.binding.retry_with_data(token, data_url, now).is_none() {
                    log::debug!("Design changed during fallback fetch of {}", path);
                    return false;
                }
                self.poll(now);
                true
            }
            Ok(None) => {
                log::warn!("Cannot fetch {}: blob storage is not configured", path);
                self.binding.cancel_background();
                self.background_failed("blob storage is not configured");
                false
            }
            Err(e) => {
                log::warn!("Fallback fetch of {} failed: {}", path, e);
                self.binding.cancel_background();
                self.notify(
                    NoticeLevel::Warning,
                    "The background image could not be loaded from storage.",
                );
                false
            }
        }
    }

    /// Save the design if the debounce window has passed.
    ///
    /// Returns true if a save ran. When the save moved an inline background
    /// to remote storage, the returned pointer replaces the inline data.
    pub async fn autosave(&mut self, now: Instant) -> EditorResult<bool> {
        let snapshot = self.store.snapshot();
        let outcome = match self.autosave.maybe_save(&snapshot, now).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Ok(false),
            Err(e) => {
                log::error!("Auto-save failed: {}", e);
                return Err(e.into());
            }
        };

        if let (Some(pointer), Some(inline)) = (outcome.adopted, snapshot.background) {
            if self.store.state().background.as_ref() == Some(&inline) {
                self.store.replace_background_reference(pointer.clone());
            }
            for entry in self.history.entries_mut() {
                if entry.background.as_ref() == Some(&inline) {
                    entry.background = Some(pointer.clone());
                }
            }
            self.delete_stale_blobs().await;
        }
        Ok(true)
    }

    /// Rasterize the canvas to PNG, without selection decorations.
    pub fn export_png(&mut self) -> EditorResult<Vec<u8>> {
        self.canvas.discard_selection();
        self.store.clear_selection();
        self.canvas.export_png().map_err(|e| match e {
            CanvasError::NotReady => EditorError::CanvasNotReady,
            CanvasError::Export(message) => EditorError::Export(message),
        })
    }

    // --- Internals ---

    /// Merge a patch into the model, then push the layer to the canvas.
    ///
    /// `push` is false for changes the canvas already shows (gesture results).
    fn apply_patch(&mut self, id: LayerId, patch: &LayerPatch, push: bool, now: Instant) -> EditorResult<bool> {
        match self.store.update_text_layer(id, patch) {
            None => {
                log::debug!("Update of unknown layer {} ignored", id);
                Err(EditorError::NotFound(id))
            }
            Some(false) => Ok(false),
            Some(true) => {
                if push {
                    if let Some(layer) = self.store.layer(id) {
                        self.binding.push_layer(&mut self.canvas, layer);
                    }
                    self.canvas.request_render();
                }
                self.autosave.mark_dirty(now);
                Ok(true)
            }
        }
    }

    /// Record a history entry and schedule a save.
    fn commit(&mut self, now: Instant) {
        self.history.record(self.store.snapshot());
        self.autosave.mark_dirty(now);
    }

    /// Full-rebuild restore of a snapshot.
    fn restore(&mut self, state: DesignState, now: Instant) {
        self.store.replace(state);
        self.binding.begin_epoch();
        self.pending_fetch = None;
        self.binding.rebuild(&mut self.canvas, self.store.state());
        if let Some(background) = self.store.state().background.clone() {
            self.binding.request_background(&background, now);
            self.poll(now);
        }
    }

    fn background_path(&self) -> Option<String> {
        self.store
            .state()
            .background
            .as_ref()
            .and_then(|b| b.path().map(str::to_string))
    }

    /// Delete replaced blobs, except one the current design points at again.
    async fn delete_stale_blobs(&mut self) {
        let current = self.background_path();
        for path in std::mem::take(&mut self.stale_blobs) {
            if current.as_deref() != Some(path.as_str()) {
                self.autosave.adapter_mut().delete_remote(&path).await;
            }
        }
    }

    fn background_failed(&mut self, reason: &str) {
        self.notify(
            NoticeLevel::Warning,
            format!("The background image could not be loaded: {}", reason),
        );
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }
}
