//! Text layer model.
//!
//! A [`TextLayer`] is plain data: the [`DesignStore`](crate::design::DesignStore)
//! owns every layer, and the canvas binding only mirrors it.

use kurbo::Point;
use peniko::color::{Srgb, parse_color};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a text layer.
///
/// Assigned at creation and never reused after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(Uuid);

impl LayerId {
    /// Create a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for LayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Horizontal text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

impl TextAlign {
    /// Get display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            TextAlign::Left => "Left",
            TextAlign::Center => "Center",
            TextAlign::Right => "Right",
        }
    }

    /// Get all alignments.
    pub fn all() -> &'static [TextAlign] {
        &[TextAlign::Left, TextAlign::Center, TextAlign::Right]
    }
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

/// One overlay text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextLayer {
    pub id: LayerId,
    /// Text content, may be empty or contain line breaks.
    pub text: String,
    pub font_family: String,
    pub font_weight: String,
    /// Font size in pixels.
    pub font_size: f64,
    /// Normalized `#rrggbb` color.
    pub color: String,
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub alignment: TextAlign,
    /// Anchor position in canvas space.
    pub x: f64,
    pub y: f64,
    /// Rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Hidden layers keep their z-order slot but are not rendered.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

impl TextLayer {
    /// Content of a freshly added layer.
    pub const DEFAULT_TEXT: &'static str = "New Text";
    /// Default font size in pixels.
    pub const DEFAULT_FONT_SIZE: f64 = 40.0;
    pub const DEFAULT_FONT_FAMILY: &'static str = "Arial";
    pub const DEFAULT_FONT_WEIGHT: &'static str = "normal";
    pub const DEFAULT_COLOR: &'static str = "#ffffff";

    /// Create a layer with default attributes at `position`.
    pub fn new(position: Point) -> Self {
        Self {
            id: LayerId::new(),
            text: Self::DEFAULT_TEXT.to_string(),
            font_family: Self::DEFAULT_FONT_FAMILY.to_string(),
            font_weight: Self::DEFAULT_FONT_WEIGHT.to_string(),
            font_size: Self::DEFAULT_FONT_SIZE,
            color: Self::DEFAULT_COLOR.to_string(),
            opacity: 1.0,
            alignment: TextAlign::default(),
            x: position.x,
            y: position.y,
            rotation: 0.0,
            visible: true,
        }
    }

    /// Set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the font family.
    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    /// Set the font size.
    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    /// Anchor position.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Move the anchor.
    pub fn set_position(&mut self, position: Point) {
        self.x = position.x;
        self.y = position.y;
    }

    /// Merge `patch` into this layer. Returns true if any attribute changed.
    pub fn apply(&mut self, patch: &LayerPatch) -> bool {
        let before = self.clone();
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(family) = &patch.font_family {
            self.font_family.clone_from(family);
        }
        if let Some(weight) = &patch.font_weight {
            self.font_weight.clone_from(weight);
        }
        if let Some(size) = patch.font_size {
            self.font_size = size;
        }
        if let Some(color) = &patch.color {
            self.color.clone_from(color);
        }
        if let Some(opacity) = patch.opacity {
            self.opacity = opacity;
        }
        if let Some(alignment) = patch.alignment {
            self.alignment = alignment;
        }
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(rotation) = patch.rotation {
            self.rotation = rotation;
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        *self != before
    }
}

/// Partial attribute update for a layer. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<TextAlign>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl LayerPatch {
    /// Patch that only replaces the text content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Patch that only moves the anchor.
    pub fn position(position: Point) -> Self {
        Self {
            x: Some(position.x),
            y: Some(position.y),
            ..Self::default()
        }
    }

    /// Patch that only sets the rotation.
    pub fn rotation(degrees: f64) -> Self {
        Self {
            rotation: Some(degrees),
            ..Self::default()
        }
    }

    /// Check if the patch carries no attributes.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate panel input: clamp font size and opacity, normalize color.
    ///
    /// An unparseable color is dropped from the patch rather than stored.
    pub fn sanitized(mut self, min_font_size: f64, max_font_size: f64) -> Self {
        if let Some(size) = self.font_size {
            self.font_size = if size.is_finite() {
                Some(size.clamp(min_font_size, max_font_size))
            } else {
                None
            };
        }
        if let Some(opacity) = self.opacity {
            self.opacity = if opacity.is_finite() {
                Some(opacity.clamp(0.0, 1.0))
            } else {
                None
            };
        }
        if let Some(color) = self.color.take() {
            match normalize_hex_color(&color) {
                Some(normalized) => self.color = Some(normalized),
                None => log::warn!("Ignoring invalid color: {}", color),
            }
        }
        self
    }
}

/// Normalize any CSS color string to lowercase `#rrggbb`.
///
/// Alpha is discarded; layer transparency lives in [`TextLayer::opacity`].
pub fn normalize_hex_color(input: &str) -> Option<String> {
    let parsed = parse_color(input.trim()).ok()?;
    let rgba = parsed.to_alpha_color::<Srgb>().to_rgba8();
    Some(format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_defaults() {
        let layer = TextLayer::new(Point::new(400.0, 300.0));
        assert_eq!(layer.text, "New Text");
        assert_eq!(layer.position(), Point::new(400.0, 300.0));
        assert_eq!(layer.alignment, TextAlign::Center);
        assert!(layer.visible);
        assert!((layer.opacity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ids_are_unique() {
        let a = TextLayer::new(Point::ZERO);
        let b = TextLayer::new(Point::ZERO);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_apply_patch() {
        let mut layer = TextLayer::new(Point::ZERO);
        let changed = layer.apply(&LayerPatch {
            font_size: Some(64.0),
            alignment: Some(TextAlign::Right),
            ..LayerPatch::default()
        });
        assert!(changed);
        assert!((layer.font_size - 64.0).abs() < f64::EPSILON);
        assert_eq!(layer.alignment, TextAlign::Right);
        assert_eq!(layer.text, "New Text");

        assert!(!layer.apply(&LayerPatch::default()));
    }

    #[test]
    fn test_sanitize_clamps() {
        let patch = LayerPatch {
            font_size: Some(500.0),
            opacity: Some(-0.5),
            ..LayerPatch::default()
        }
        .sanitized(8.0, 200.0);
        assert_eq!(patch.font_size, Some(200.0));
        assert_eq!(patch.opacity, Some(0.0));

        let patch = LayerPatch {
            font_size: Some(f64::NAN),
            ..LayerPatch::default()
        }
        .sanitized(8.0, 200.0);
        assert_eq!(patch.font_size, None);
    }

    #[test]
    fn test_sanitize_color() {
        let patch = LayerPatch {
            color: Some("#ABC".to_string()),
            ..LayerPatch::default()
        }
        .sanitized(8.0, 200.0);
        assert_eq!(patch.color.as_deref(), Some("#aabbcc"));

        let patch = LayerPatch {
            color: Some("not a color".to_string()),
            ..LayerPatch::default()
        }
        .sanitized(8.0, 200.0);
        assert!(patch.color.is_none());
    }

    #[test]
    fn test_normalize_hex_color() {
        assert_eq!(normalize_hex_color("#FF0000").as_deref(), Some("#ff0000"));
        assert_eq!(normalize_hex_color(" white ").as_deref(), Some("#ffffff"));
        assert_eq!(normalize_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_serde_field_names() {
        let layer = TextLayer::new(Point::new(1.0, 2.0));
        let json = serde_json::to_value(&layer).unwrap();
        assert!(json.get("fontFamily").is_some());
        assert!(json.get("fontSize").is_some());
        assert_eq!(json["alignment"], "center");
        assert_eq!(json["id"], layer.id.to_string());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let json = r##"{
            "id": "6f1c2b1e-6a7d-4f0e-9a4e-2b1c3d4e5f60",
            "text": "Hi",
            "fontFamily": "Impact",
            "fontWeight": "bold",
            "fontSize": 30,
            "color": "#000000",
            "x": 10,
            "y": 20
        }"##;
        let layer: TextLayer = serde_json::from_str(json).unwrap();
        assert!(layer.visible);
        assert!((layer.opacity - 1.0).abs() < f64::EPSILON);
        assert_eq!(layer.alignment, TextAlign::Center);
        assert!((layer.rotation).abs() < f64::EPSILON);
    }
}
