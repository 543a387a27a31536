//! Canvas binding: keeps a live interactive canvas consistent with the design.
//!
//! The canvas runtime is an external collaborator behind [`CanvasRuntime`].
//! Model changes are pushed into it; gestures come back as [`CanvasEvent`]
//! values which the editor turns into store mutations.
//!
//! The binding holds an id-indexed map from layers to canvas objects. The map
//! is a non-owning cache: whenever an expected entry is missing or stale it is
//! rebuilt from the layer tags the canvas objects carry.

mod input;
mod memory;
pub mod snap;

pub use input::{NUDGE_STEP, NudgeDirection};
pub use memory::{MemoryCanvas, MemoryObject};

use crate::Instant;
use crate::background::{BackgroundImage, fit_within};
use crate::design::DesignState;
use crate::layer::{LayerId, TextLayer};
use kurbo::{Point, Size};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Handle of a live object inside the canvas runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(pub u64);

/// A canvas object together with the layer id it is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasObjectInfo {
    pub key: ObjectKey,
    pub layer: Option<LayerId>,
}

/// Identifies one background load request.
///
/// `epoch` changes on reset and restore; `seq` changes on every request.
/// Results carrying any other token are stale and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken {
    pub epoch: u64,
    pub seq: u64,
}

/// What the canvas should load as its background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Load by URL (may fail under cross-origin rules).
    Url(String),
    /// Inline `data:` URL.
    Data(String),
}

impl From<&BackgroundImage> for ImageSource {
    fn from(background: &BackgroundImage) -> Self {
        match background {
            BackgroundImage::Inline { data_url } => ImageSource::Data(data_url.clone()),
            BackgroundImage::Remote { url, .. } | BackgroundImage::Linked { url } => ImageSource::Url(url.clone()),
        }
    }
}

/// Canvas runtime errors.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Canvas surface is not ready")]
    NotReady,
    #[error("Export failed: {0}")]
    Export(String),
}

/// Contract of the interactive canvas the binding drives.
pub trait CanvasRuntime {
    /// Whether the drawing surface is attached and usable.
    fn is_ready(&self) -> bool;

    /// Create a live text object tagged with `layer.id`.
    fn add_text(&mut self, layer: &TextLayer) -> ObjectKey;

    /// Push every attribute of `layer` to an object. Returns false if the object is gone.
    fn update_text(&mut self, key: ObjectKey, layer: &TextLayer) -> bool;

    /// Move an object's anchor without touching the model.
    fn set_object_position(&mut self, key: ObjectKey, position: Point) -> bool;

    /// Remove an object.
    fn remove_object(&mut self, key: ObjectKey);

    /// Text objects in stacking order, bottom first.
    fn objects(&self) -> Vec<CanvasObjectInfo>;

    /// Place an object at `index` in the stacking order.
    fn move_object_to(&mut self, key: ObjectKey, index: usize);

    /// Start loading an image. Completion arrives as [`CanvasEvent::ImageLoaded`]
    /// or [`CanvasEvent::ImageLoadFailed`] carrying `token`.
    fn load_image(&mut self, source: &ImageSource, token: LoadToken);

    /// Show the image loaded under `token` as the background, scaled to `size`.
    fn apply_background(&mut self, token: LoadToken, size: Size);

    fn clear_background(&mut self);

    /// Resize the drawing surface.
    fn resize(&mut self, size: Size);

    fn size(&self) -> Size;

    /// Remove every object and the background.
    fn clear(&mut self);

    /// Drop the canvas-side active object.
    fn discard_selection(&mut self);

    /// Schedule a redraw.
    fn request_render(&mut self);

    /// Rasterize the whole canvas to PNG bytes.
    fn export_png(&mut self) -> Result<Vec<u8>, CanvasError>;
}

/// Gesture and load notifications coming out of the canvas runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// In-place text edit finished.
    TextChanged { key: ObjectKey, text: String },
    /// Drag tick. `center` is the object's bounding-box center.
    Moving { key: ObjectKey, origin: Point, center: Point },
    /// Drag committed.
    Moved { key: ObjectKey, origin: Point },
    /// Rotation committed, in degrees.
    Rotated { key: ObjectKey, degrees: f64 },
    Selected { key: ObjectKey },
    SelectionCleared,
    /// Key press while the canvas area has focus.
    KeyPressed { key: String },
    ImageLoaded { token: LoadToken, width: u32, height: u32 },
    ImageLoadFailed { token: LoadToken, cross_origin: bool, message: String },
}

/// Outcome of [`CanvasBinding::poll_background`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPoll {
    /// Nothing pending.
    Idle,
    /// Surface not ready yet, retry scheduled.
    Waiting { attempt: u32 },
    /// Load handed to the canvas, waiting for its result.
    InFlight,
    /// Load dispatched during this poll.
    Dispatched(LoadToken),
    /// Retry budget exhausted.
    GaveUp,
}

/// How a failed background load should proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// Result belongs to an outdated request.
    Stale,
    /// Fetch the bytes at `path` and retry with inline data (once).
    FetchBytes { token: LoadToken, path: String },
    /// Give up and tell the user.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    WaitingForSurface,
    InFlight,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    token: LoadToken,
    source: ImageSource,
    remote_path: Option<String>,
    state: LoadState,
    attempts: u32,
    next_attempt: Instant,
    fallback_used: bool,
}

/// Synchronizes a [`CanvasRuntime`] with the design model.
#[derive(Debug, Clone)]
pub struct CanvasBinding {
    objects: HashMap<LayerId, ObjectKey>,
    epoch: u64,
    next_seq: u64,
    pending: Option<PendingLoad>,
    retry_attempts: u32,
    retry_delay: Duration,
    snap_threshold: f64,
}

impl CanvasBinding {
    /// Create a binding with the given surface retry budget.
    pub fn new(retry_attempts: u32, retry_delay: Duration, snap_threshold: f64) -> Self {
        Self {
            objects: HashMap::new(),
            epoch: 0,
            next_seq: 0,
            pending: None,
            retry_attempts: retry_attempts.max(1),
            retry_delay,
            snap_threshold,
        }
    }

    /// Current load epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Invalidate every outstanding background load.
    pub fn begin_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.pending = None;
        self.epoch
    }

    /// Drop the id → object map. It is rebuilt from canvas tags on next use.
    pub fn invalidate(&mut self) {
        self.objects.clear();
    }

    /// Number of tracked layer objects.
    pub fn tracked(&self) -> usize {
        self.objects.len()
    }

    /// Rebuild the id → object map from the tags on live canvas objects.
    pub fn rebuild_index<C: CanvasRuntime>(&mut self, canvas: &C) {
        self.objects.clear();
        for info in canvas.objects() {
            if let Some(layer) = info.layer {
                self.objects.insert(layer, info.key);
            }
        }
        log::debug!("Rebuilt canvas index: {} objects", self.objects.len());
    }

    /// Find the canvas object of a layer, re-scanning the canvas if needed.
    pub fn resolve<C: CanvasRuntime>(&mut self, canvas: &C, id: LayerId) -> Option<ObjectKey> {
        if let Some(&key) = self.objects.get(&id) {
            if canvas.objects().iter().any(|info| info.key == key) {
                return Some(key);
            }
        }
        self.rebuild_index(canvas);
        self.objects.get(&id).copied()
    }

    /// Find the layer an object belongs to.
    pub fn layer_for<C: CanvasRuntime>(&mut self, canvas: &C, key: ObjectKey) -> Option<LayerId> {
        let cached = self
            .objects
            .iter()
            .find_map(|(&id, &k)| (k == key).then_some(id));
        if cached.is_some() {
            return cached;
        }
        self.rebuild_index(canvas);
        self.objects
            .iter()
            .find_map(|(&id, &k)| (k == key).then_some(id))
    }

    /// Create the live object for a new layer.
    pub fn attach_layer<C: CanvasRuntime>(&mut self, canvas: &mut C, layer: &TextLayer) -> ObjectKey {
        let key = canvas.add_text(layer);
        self.objects.insert(layer.id, key);
        key
    }

    /// Push a layer's full attribute set to its canvas object.
    ///
    /// Returns false (after a re-resolution attempt) if the object cannot be found.
    pub fn push_layer<C: CanvasRuntime>(&mut self, canvas: &mut C, layer: &TextLayer) -> bool {
        if let Some(&key) = self.objects.get(&layer.id) {
            if canvas.update_text(key, layer) {
                return true;
            }
        }
        self.rebuild_index(canvas);
        match self.objects.get(&layer.id) {
            Some(&key) if canvas.update_text(key, layer) => true,
            _ => {
                log::warn!("No canvas object for layer {}, skipping update", layer.id);
                false
            }
        }
    }

    /// Remove a layer's canvas object.
    pub fn detach_layer<C: CanvasRuntime>(&mut self, canvas: &mut C, id: LayerId) {
        match self.resolve(canvas, id) {
            Some(key) => canvas.remove_object(key),
            None => log::warn!("No canvas object for deleted layer {}", id),
        }
        self.objects.remove(&id);
    }

    /// Re-derive the canvas stacking order from the layer array.
    pub fn sync_z_order<C: CanvasRuntime>(&mut self, canvas: &mut C, layers: &[TextLayer]) {
        let mut index = 0;
        for layer in layers {
            match self.resolve(canvas, layer.id) {
                Some(key) => {
                    canvas.move_object_to(key, index);
                    index += 1;
                }
                None => log::warn!("Layer {} missing from canvas during reorder", layer.id),
            }
        }
    }

    /// Destructive restore: clear the canvas and rebuild every object from `state`.
    ///
    /// The background is not loaded here; see [`Self::request_background`].
    pub fn rebuild<C: CanvasRuntime>(&mut self, canvas: &mut C, state: &DesignState) {
        canvas.clear();
        self.objects.clear();
        canvas.resize(state.canvas_size());
        for layer in &state.text_layers {
            self.attach_layer(canvas, layer);
        }
        canvas.request_render();
    }

    /// Snap a dragged object to the canvas center lines.
    ///
    /// Returns the adjusted anchor if snapping moved the object.
    pub fn snap_drag<C: CanvasRuntime>(
        &self,
        canvas: &mut C,
        key: ObjectKey,
        origin: Point,
        center: Point,
    ) -> Option<Point> {
        let result = snap::snap_to_center(center, canvas.size(), self.snap_threshold);
        if !result.is_snapped() || result.point == center {
            return None;
        }
        let adjusted = origin + (result.point - center);
        canvas.set_object_position(key, adjusted);
        Some(adjusted)
    }

    /// Queue a background load for the current epoch.
    pub fn request_background(&mut self, background: &BackgroundImage, now: Instant) -> LoadToken {
        let token = self.next_token();
        self.pending = Some(PendingLoad {
            token,
            source: ImageSource::from(background),
            remote_path: background.path().map(str::to_string),
            state: LoadState::WaitingForSurface,
            attempts: 0,
            next_attempt: now,
            fallback_used: false,
        });
        token
    }

    /// Token of the pending load, if any.
    pub fn pending_token(&self) -> Option<LoadToken> {
        self.pending.as_ref().map(|p| p.token)
    }

    /// Dispatch the pending load once the surface is ready.
    ///
    /// Each failed readiness check costs one attempt and waits the retry delay.
    pub fn poll_background<C: CanvasRuntime>(&mut self, canvas: &mut C, now: Instant) -> LoadPoll {
        let Some(pending) = self.pending.as_mut() else {
            return LoadPoll::Idle;
        };
        match pending.state {
            LoadState::InFlight => LoadPoll::InFlight,
            LoadState::WaitingForSurface if now < pending.next_attempt => LoadPoll::Waiting {
                attempt: pending.attempts,
            },
            LoadState::WaitingForSurface => {
                if canvas.is_ready() {
                    pending.state = LoadState::InFlight;
                    canvas.load_image(&pending.source, pending.token);
                    return LoadPoll::Dispatched(pending.token);
                }
                pending.attempts += 1;
                if pending.attempts >= self.retry_attempts {
                    log::error!(
                        "Canvas surface not ready after {} attempts, giving up on background",
                        pending.attempts
                    );
                    self.pending = None;
                    return LoadPoll::GaveUp;
                }
                pending.next_attempt = now + self.retry_delay;
                log::debug!("Canvas not ready, retry {} scheduled", pending.attempts);
                LoadPoll::Waiting {
                    attempt: pending.attempts,
                }
            }
        }
    }

    /// Apply a finished load. Returns the fitted canvas size, or `None` if stale.
    pub fn on_image_loaded<C: CanvasRuntime>(
        &mut self,
        canvas: &mut C,
        token: LoadToken,
        source_size: Size,
        max_size: Size,
    ) -> Option<Size> {
        if !self.is_current(token) {
            log::debug!("Discarding stale image load {:?}", token);
            return None;
        }
        self.pending = None;
        let size = fit_within(source_size, max_size);
        canvas.resize(size);
        canvas.apply_background(token, size);
        canvas.request_render();
        Some(size)
    }

    /// Decide how to proceed after a failed load.
    ///
    /// A cross-origin failure of a remote pointer gets exactly one byte-fetch fallback.
    pub fn on_image_failed(&mut self, token: LoadToken, cross_origin: bool) -> LoadFailure {
        if !self.is_current(token) {
            return LoadFailure::Stale;
        }
        let Some(pending) = self.pending.as_mut() else {
            return LoadFailure::Stale;
        };
        if cross_origin && !pending.fallback_used {
            if let Some(path) = pending.remote_path.clone() {
                pending.fallback_used = true;
                return LoadFailure::FetchBytes { token, path };
            }
        }
        self.pending = None;
        LoadFailure::Failed
    }

    /// Retry a failed load with inline data. Returns `None` if the request went stale meanwhile.
    pub fn retry_with_data(&mut self, previous: LoadToken, data_url: String, now: Instant) -> Option<LoadToken> {
        if !self.is_current(previous) {
            return None;
        }
        let token = self.next_token();
        let pending = self.pending.as_mut()?;
        pending.token = token;
        pending.source = ImageSource::Data(data_url);
        pending.state = LoadState::WaitingForSurface;
        pending.attempts = 0;
        pending.next_attempt = now;
        Some(token)
    }

    /// Abandon the pending load.
    pub fn cancel_background(&mut self) {
        self.pending = None;
    }

    fn is_current(&self, token: LoadToken) -> bool {
        token.epoch == self.epoch && self.pending.as_ref().is_some_and(|p| p.token == token)
    }

    fn next_token(&mut self) -> LoadToken {
        self.next_seq += 1;
        LoadToken {
            epoch: self.epoch,
            seq: self.next_seq,
        }
    }
}
