//! Snap-to-center assist for dragged layers.

use kurbo::{Point, Size};

/// Distance from the canvas center (in canvas units) at which a dragged object snaps.
pub const CENTER_SNAP_THRESHOLD: f64 = 10.0;

/// Result of a snap operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    /// The snapped point.
    pub point: Point,
    /// Whether the X coordinate was snapped.
    pub snapped_x: bool,
    /// Whether the Y coordinate was snapped.
    pub snapped_y: bool,
}

impl SnapResult {
    /// Create a result with no snapping.
    pub fn none(point: Point) -> Self {
        Self {
            point,
            snapped_x: false,
            snapped_y: false,
        }
    }

    /// Check if any snapping occurred.
    pub fn is_snapped(&self) -> bool {
        self.snapped_x || self.snapped_y
    }
}

/// Snap an object center onto the canvas center lines.
///
/// Each axis is handled independently: a center within `threshold` of the
/// vertical center line gets its X clamped, likewise for Y.
pub fn snap_to_center(center: Point, canvas: Size, threshold: f64) -> SnapResult {
    let mid_x = canvas.width / 2.0;
    let mid_y = canvas.height / 2.0;
    let mut result = SnapResult::none(center);

    if (center.x - mid_x).abs() <= threshold {
        result.point.x = mid_x;
        result.snapped_x = true;
    }
    if (center.y - mid_y).abs() <= threshold {
        result.point.y = mid_y;
        result.snapped_y = true;
    }
    result
}
