//! Keyboard nudging.

use kurbo::Vec2;

/// Distance a layer moves per arrow key press.
pub const NUDGE_STEP: f64 = 1.0;

/// Arrow key direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl NudgeDirection {
    /// Map a key name (DOM `KeyboardEvent.key` style) to a direction.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" | "Up" => Some(NudgeDirection::Up),
            "ArrowDown" | "Down" => Some(NudgeDirection::Down),
            "ArrowLeft" | "Left" => Some(NudgeDirection::Left),
            "ArrowRight" | "Right" => Some(NudgeDirection::Right),
            _ => None,
        }
    }

    /// Offset for one press, y grows downwards.
    pub fn delta(self, step: f64) -> Vec2 {
        match self {
            NudgeDirection::Up => Vec2::new(0.0, -step),
            NudgeDirection::Down => Vec2::new(0.0, step),
            NudgeDirection::Left => Vec2::new(-step, 0.0),
            NudgeDirection::Right => Vec2::new(step, 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_key() {
        assert_eq!(NudgeDirection::from_key("ArrowLeft"), Some(NudgeDirection::Left));
        assert_eq!(NudgeDirection::from_key("Up"), Some(NudgeDirection::Up));
        assert_eq!(NudgeDirection::from_key("a"), None);
    }

    #[test]
    fn test_delta() {
        assert_eq!(NudgeDirection::Up.delta(NUDGE_STEP), Vec2::new(0.0, -1.0));
        assert_eq!(NudgeDirection::Right.delta(2.0), Vec2::new(2.0, 0.0));
    }
}
