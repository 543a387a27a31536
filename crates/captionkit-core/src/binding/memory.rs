//! Headless canvas runtime.

use super::{CanvasError, CanvasObjectInfo, CanvasRuntime, ImageSource, LoadToken, ObjectKey};
use crate::layer::{LayerId, TextLayer};
use kurbo::{Point, Size};
use std::io::Cursor;

/// A text object held by [`MemoryCanvas`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryObject {
    pub key: ObjectKey,
    pub tag: Option<LayerId>,
    /// Last attributes pushed by the binding.
    pub layer: TextLayer,
}

/// In-memory canvas for testing and headless use.
///
/// Image loads are recorded but never complete on their own; the host (or a
/// test) feeds the result back as a canvas event.
#[derive(Debug, Clone)]
pub struct MemoryCanvas {
    ready: bool,
    size: Size,
    objects: Vec<MemoryObject>,
    background: Option<(LoadToken, Size)>,
    loads: Vec<(ImageSource, LoadToken)>,
    active: Option<ObjectKey>,
    next_key: u64,
    renders: usize,
}

impl MemoryCanvas {
    /// Create a ready canvas of the given size.
    pub fn new(size: Size) -> Self {
        Self {
            ready: true,
            size,
            objects: Vec::new(),
            background: None,
            loads: Vec::new(),
            active: None,
            next_key: 1,
            renders: 0,
        }
    }

    /// Simulate the surface being (un)mounted.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Get an object by key.
    pub fn object(&self, key: ObjectKey) -> Option<&MemoryObject> {
        self.objects.iter().find(|o| o.key == key)
    }

    /// All objects, bottom first.
    pub fn stack(&self) -> &[MemoryObject] {
        &self.objects
    }

    /// Layer tags in stacking order.
    pub fn layer_order(&self) -> Vec<LayerId> {
        self.objects.iter().filter_map(|o| o.tag).collect()
    }

    /// Object of a layer, found by tag.
    pub fn object_for(&self, id: LayerId) -> Option<&MemoryObject> {
        self.objects.iter().find(|o| o.tag == Some(id))
    }

    /// Image loads requested so far.
    pub fn load_requests(&self) -> &[(ImageSource, LoadToken)] {
        &self.loads
    }

    /// Most recent load request.
    pub fn last_load(&self) -> Option<&(ImageSource, LoadToken)> {
        self.loads.last()
    }

    /// Current background token and size.
    pub fn background(&self) -> Option<(LoadToken, Size)> {
        self.background
    }

    /// Set the canvas-side active object.
    pub fn set_active(&mut self, key: Option<ObjectKey>) {
        self.active = key;
    }

    pub fn active(&self) -> Option<ObjectKey> {
        self.active
    }

    /// Number of render requests.
    pub fn render_count(&self) -> usize {
        self.renders
    }
}

impl CanvasRuntime for MemoryCanvas {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn add_text(&mut self, layer: &TextLayer) -> ObjectKey {
        let key = ObjectKey(self.next_key);
        self.next_key += 1;
        self.objects.push(MemoryObject {
            key,
            tag: Some(layer.id),
            layer: layer.clone(),
        });
        key
    }

    fn update_text(&mut self, key: ObjectKey, layer: &TextLayer) -> bool {
        match self.objects.iter_mut().find(|o| o.key == key) {
            Some(object) => {
                object.layer = layer.clone();
                true
            }
            None => false,
        }
    }

    fn set_object_position(&mut self, key: ObjectKey, position: Point) -> bool {
        match self.objects.iter_mut().find(|o| o.key == key) {
            Some(object) => {
                object.layer.set_position(position);
                true
            }
            None => false,
        }
    }

    fn remove_object(&mut self, key: ObjectKey) {
        self.objects.retain(|o| o.key != key);
        if self.active == Some(key) {
            self.active = None;
        }
    }

    fn objects(&self) -> Vec<CanvasObjectInfo> {
        self.objects
            .iter()
            .map(|o| CanvasObjectInfo {
                key: o.key,
                layer: o.tag,
            })
            .collect()
    }

    fn move_object_to(&mut self, key: ObjectKey, index: usize) {
        if let Some(pos) = self.objects.iter().position(|o| o.key == key) {
            let object = self.objects.remove(pos);
            let index = index.min(self.objects.len());
            self.objects.insert(index, object);
        }
    }

    fn load_image(&mut self, source: &ImageSource, token: LoadToken) {
        self.loads.push((source.clone(), token));
    }

    fn apply_background(&mut self, token: LoadToken, size: Size) {
        self.background = Some((token, size));
    }

    fn clear_background(&mut self) {
        self.background = None;
    }

    fn resize(&mut self, size: Size) {
        self.size = size;
    }

    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.background = None;
        self.active = None;
    }

    fn discard_selection(&mut self) {
        self.active = None;
    }

    fn request_render(&mut self) {
        self.renders += 1;
    }

    fn export_png(&mut self) -> Result<Vec<u8>, CanvasError> {
        if !self.ready {
            return Err(CanvasError::NotReady);
        }
        let width = self.size.width.round().max(1.0) as u32;
        let height = self.size.height.round().max(1.0) as u32;
        let raster = image::RgbaImage::new(width, height);
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(raster)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| CanvasError::Export(e.to_string()))?;
        Ok(out)
    }
}
