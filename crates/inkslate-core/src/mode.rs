//! Editing modes and per-gesture tool configuration.

use crate::pen::PenStyle;
use crate::stroke::{PenType, SerializableColor};
use serde::{Deserialize, Serialize};

/// Width of the hardware ink trail shown while erasing with a radius eraser.
const ERASER_TRAIL_WIDTH: f64 = 30.0;
/// Width of the hardware ink trail shown while drawing a lasso.
const LASSO_TRAIL_WIDTH: f64 = 3.0;

/// Editing mode that routes input gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Draw,
    Erase,
    Select,
}

impl Mode {
    /// Cycle to the next mode.
    pub fn next(self) -> Self {
        match self {
            Mode::Draw => Mode::Erase,
            Mode::Erase => Mode::Select,
            Mode::Select => Mode::Draw,
        }
    }
}

/// Eraser variants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Eraser {
    /// Removes every stroke the eraser touches.
    Stroke { radius: f64 },
    /// Removes only the touched part of a stroke, keeping the rest as new strokes.
    Area { radius: f64 },
    /// Removes every stroke with a point inside the closed lasso.
    Lasso,
}

impl Default for Eraser {
    fn default() -> Self {
        Eraser::Stroke { radius: 15.0 }
    }
}

/// Immutable tool configuration captured for one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolConfig {
    pub mode: Mode,
    pub pen: PenStyle,
    pub eraser: Eraser,
}

impl ToolConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pen(mut self, pen: PenStyle) -> Self {
        self.pen = pen;
        self
    }

    pub fn with_eraser(mut self, eraser: Eraser) -> Self {
        self.eraser = eraser;
        self
    }
}

/// Style the hardware overlay uses to echo ink while the pen is down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InkingStyle {
    pub pen: PenType,
    pub width: f64,
    pub color: SerializableColor,
}

impl InkingStyle {
    pub fn for_config(config: &ToolConfig) -> Self {
        match config.mode {
            Mode::Draw => Self {
                pen: config.pen.pen,
                width: config.pen.width,
                color: config.pen.color,
            },
            Mode::Erase => match config.eraser {
                Eraser::Stroke { .. } | Eraser::Area { .. } => Self {
                    pen: PenType::Marker,
                    width: ERASER_TRAIL_WIDTH,
                    color: SerializableColor::gray(),
                },
                Eraser::Lasso => Self::lasso(),
            },
            Mode::Select => Self::lasso(),
        }
    }

    fn lasso() -> Self {
        Self {
            pen: PenType::Ballpen,
            width: LASSO_TRAIL_WIDTH,
            color: SerializableColor::gray(),
        }
    }
}
