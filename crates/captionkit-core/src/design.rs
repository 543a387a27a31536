//! Design state and the store that mutates it.

use crate::background::{BackgroundImage, fit_within};
use crate::config::EditorConfig;
use crate::layer::{LayerId, LayerPatch, TextLayer};
use kurbo::{Point, Size};

/// A complete design: the unit of undo/redo and of persistence.
///
/// Cloning produces an independent deep copy, so snapshots never alias the
/// live layers.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignState {
    pub background: Option<BackgroundImage>,
    /// Layers in z-order, bottom to top.
    pub text_layers: Vec<TextLayer>,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl DesignState {
    /// Create an empty design with the given canvas size.
    pub fn new(canvas_size: Size) -> Self {
        Self {
            background: None,
            text_layers: Vec::new(),
            canvas_width: canvas_size.width,
            canvas_height: canvas_size.height,
        }
    }

    /// Canvas size.
    pub fn canvas_size(&self) -> Size {
        Size::new(self.canvas_width, self.canvas_height)
    }

    /// Get a layer by ID.
    pub fn layer(&self, id: LayerId) -> Option<&TextLayer> {
        self.text_layers.iter().find(|l| l.id == id)
    }

    /// Z-order index of a layer.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.text_layers.iter().position(|l| l.id == id)
    }

    /// Layer ids in z-order.
    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.text_layers.iter().map(|l| l.id).collect()
    }

    /// Check if the design has no layers and no background.
    pub fn is_empty(&self) -> bool {
        self.text_layers.is_empty() && self.background.is_none()
    }
}

/// Direction for [`DesignStore::reorder_layer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Towards the top of the stack.
    Up,
    /// Towards the bottom of the stack.
    Down,
}

/// Owns the current design and the layer selection.
///
/// Mutations are pure model updates; rendering and I/O live elsewhere.
#[derive(Debug, Clone)]
pub struct DesignStore {
    state: DesignState,
    selected: Option<LayerId>,
    default_canvas_size: Size,
    max_canvas_size: Size,
}

impl DesignStore {
    /// Create a store with an empty design.
    pub fn new(default_canvas_size: Size, max_canvas_size: Size) -> Self {
        Self {
            state: DesignState::new(default_canvas_size),
            selected: None,
            default_canvas_size,
            max_canvas_size,
        }
    }

    /// Create a store sized from the editor configuration.
    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(config.default_canvas_size, config.max_canvas_size)
    }

    /// The current design.
    pub fn state(&self) -> &DesignState {
        &self.state
    }

    /// Deep copy of the current design.
    pub fn snapshot(&self) -> DesignState {
        self.state.clone()
    }

    /// Replace the whole design, e.g. when restoring a snapshot.
    ///
    /// The selection survives only if the selected layer still exists.
    pub fn replace(&mut self, state: DesignState) {
        self.state = state;
        if let Some(id) = self.selected {
            if self.state.layer(id).is_none() {
                self.selected = None;
            }
        }
    }

    /// Get a layer by ID.
    pub fn layer(&self, id: LayerId) -> Option<&TextLayer> {
        self.state.layer(id)
    }

    /// Append a default layer centered on the canvas. Returns its id.
    pub fn add_text_layer(&mut self) -> LayerId {
        let size = self.state.canvas_size();
        let layer = TextLayer::new(Point::new(size.width / 2.0, size.height / 2.0));
        let id = layer.id;
        self.state.text_layers.push(layer);
        id
    }

    /// Merge `patch` into a layer.
    ///
    /// Returns `None` if the layer does not exist, otherwise whether anything changed.
    pub fn update_text_layer(&mut self, id: LayerId, patch: &LayerPatch) -> Option<bool> {
        let layer = self.state.text_layers.iter_mut().find(|l| l.id == id)?;
        Some(layer.apply(patch))
    }

    /// Remove a layer. Clears the selection if it pointed at this layer.
    pub fn delete_text_layer(&mut self, id: LayerId) -> Option<TextLayer> {
        let index = self.state.index_of(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Some(self.state.text_layers.remove(index))
    }

    /// Swap a layer with its neighbor.
    /// Returns true if the layer moved, false at the boundary or if missing.
    pub fn reorder_layer(&mut self, id: LayerId, direction: ReorderDirection) -> bool {
        let Some(pos) = self.state.index_of(id) else {
            return false;
        };
        match direction {
            ReorderDirection::Up if pos + 1 < self.state.text_layers.len() => {
                self.state.text_layers.swap(pos, pos + 1);
                true
            }
            ReorderDirection::Down if pos > 0 => {
                self.state.text_layers.swap(pos, pos - 1);
                true
            }
            _ => false,
        }
    }

    /// Replace the background and fit the canvas to the image bounds.
    pub fn set_background_image(&mut self, background: BackgroundImage, source_size: Size) -> Size {
        self.state.background = Some(background);
        let size = fit_within(source_size, self.max_canvas_size);
        self.set_canvas_size(size);
        size
    }

    /// Swap the background reference without touching dimensions.
    ///
    /// Used when a remote pointer takes over from inline data of the same image.
    pub fn replace_background_reference(&mut self, background: BackgroundImage) {
        self.state.background = Some(background);
    }

    /// Resize the canvas.
    pub fn set_canvas_size(&mut self, size: Size) {
        self.state.canvas_width = size.width;
        self.state.canvas_height = size.height;
    }

    /// Clear layers, background and selection, back to the default size.
    pub fn reset(&mut self) {
        self.state = DesignState::new(self.default_canvas_size);
        self.selected = None;
    }

    /// Select a layer. Returns false if it does not exist.
    pub fn select(&mut self, id: LayerId) -> bool {
        if self.state.layer(id).is_some() {
            self.selected = Some(id);
            true
        } else {
            false
        }
    }

    /// Clear selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Currently selected layer id.
    pub fn selected(&self) -> Option<LayerId> {
        self.selected
    }

    /// Currently selected layer.
    pub fn selected_layer(&self) -> Option<&TextLayer> {
        self.selected.and_then(|id| self.state.layer(id))
    }

    pub fn default_canvas_size(&self) -> Size {
        self.default_canvas_size
    }

    pub fn max_canvas_size(&self) -> Size {
        self.max_canvas_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> DesignStore {
        DesignStore::new(Size::new(800.0, 600.0), Size::new(1200.0, 800.0))
    }

    #[test]
    fn test_fresh_design() {
        let mut store = store();
        let id = store.add_text_layer();
        store.select(id);

        let layer = store.layer(id).unwrap();
        assert_eq!(layer.text, "New Text");
        assert_eq!(layer.position(), Point::new(400.0, 300.0));
        assert_eq!(store.state().text_layers.len(), 1);

        store.delete_text_layer(id);
        assert!(store.state().text_layers.is_empty());
        assert_eq!(store.selected(), None);
    }

    #[test]
    fn test_add_appends_on_top() {
        let mut store = store();
        let a = store.add_text_layer();
        let b = store.add_text_layer();
        assert_eq!(store.state().layer_ids(), vec![a, b]);
    }

    #[test]
    fn test_update_missing_layer() {
        let mut store = store();
        assert_eq!(store.update_text_layer(LayerId::new(), &LayerPatch::text("x")), None);
    }

    #[test]
    fn test_reorder_up_then_down_restores_order() {
        let mut store = store();
        let a = store.add_text_layer();
        let b = store.add_text_layer();
        let c = store.add_text_layer();
        let original = store.state().layer_ids();

        assert!(store.reorder_layer(b, ReorderDirection::Up));
        assert_eq!(store.state().layer_ids(), vec![a, c, b]);
        assert_eq!(store.state().index_of(b), Some(2));

        assert!(store.reorder_layer(b, ReorderDirection::Down));
        assert_eq!(store.state().layer_ids(), original);
    }

    #[test]
    fn test_reorder_boundaries_are_noops() {
        let mut store = store();
        let bottom = store.add_text_layer();
        let top = store.add_text_layer();
        let before = store.snapshot();

        assert!(!store.reorder_layer(top, ReorderDirection::Up));
        assert!(!store.reorder_layer(bottom, ReorderDirection::Down));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_ids_stay_unique_under_random_ops() {
        let mut store = store();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for _ in 0..500 {
            let ids = store.state().layer_ids();
            match next() % 4 {
                0 | 1 => {
                    store.add_text_layer();
                }
                2 if !ids.is_empty() => {
                    let id = ids[(next() as usize) % ids.len()];
                    store.delete_text_layer(id);
                }
                _ if !ids.is_empty() => {
                    let id = ids[(next() as usize) % ids.len()];
                    let dir = if next() % 2 == 0 {
                        ReorderDirection::Up
                    } else {
                        ReorderDirection::Down
                    };
                    store.reorder_layer(id, dir);
                }
                _ => {}
            }
            let ids = store.state().layer_ids();
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len());
        }
    }

    #[test]
    fn test_background_fits_canvas() {
        let mut store = store();
        let size = store.set_background_image(
            BackgroundImage::remote("a.png", "https://cdn/a.png"),
            Size::new(3000.0, 1500.0),
        );
        assert_eq!(size, Size::new(1200.0, 600.0));
        assert_eq!(store.state().canvas_size(), Size::new(1200.0, 600.0));
    }

    #[test]
    fn test_reset() {
        let mut store = store();
        let id = store.add_text_layer();
        store.select(id);
        store.set_background_image(
            BackgroundImage::remote("a.png", "u"),
            Size::new(100.0, 100.0),
        );

        store.reset();
        assert!(store.state().is_empty());
        assert_eq!(store.selected(), None);
        assert_eq!(store.state().canvas_size(), Size::new(800.0, 600.0));
    }

    #[test]
    fn test_snapshot_is_deep_copy() {
        let mut store = store();
        let id = store.add_text_layer();
        let snapshot = store.snapshot();
        store.update_text_layer(id, &LayerPatch::text("changed"));
        assert_eq!(snapshot.layer(id).unwrap().text, "New Text");
    }

    #[test]
    fn test_replace_drops_stale_selection() {
        let mut store = store();
        let before = store.snapshot();
        let id = store.add_text_layer();
        store.select(id);
        store.replace(before);
        assert_eq!(store.selected(), None);
    }
}
