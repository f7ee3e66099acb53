//! Pen styles and the pressure to width mapping.

use crate::stroke::{PenType, SerializableColor};
use serde::{Deserialize, Serialize};

/// Style applied to new strokes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenStyle {
    pub pen: PenType,
    pub width: f64,
    pub color: SerializableColor,
}

impl Default for PenStyle {
    fn default() -> Self {
        Self {
            pen: PenType::Ballpen,
            width: 3.0,
            color: SerializableColor::black(),
        }
    }
}

/// Maps raw device pressure to a width factor.
///
/// The factor is a pure function of the pressure, non-decreasing, and saturates at
/// `max_pressure`. Pens that ignore pressure always return `1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PressureCurve {
    /// Device maximum pressure.
    pub max_pressure: f64,
    /// Width factor at zero pressure.
    pub min_factor: f64,
}

impl Default for PressureCurve {
    fn default() -> Self {
        Self {
            max_pressure: 4096.0,
            min_factor: 0.4,
        }
    }
}

impl PressureCurve {
    pub fn new(max_pressure: f64, min_factor: f64) -> Self {
        Self {
            max_pressure: max_pressure.max(f64::EPSILON),
            min_factor: min_factor.clamp(0.0, 1.0),
        }
    }

    /// Width factor in `[min_factor, 1.0]` for `pressure`.
    pub fn factor(&self, pen: PenType, pressure: f64) -> f64 {
        match pen {
            PenType::Ballpen | PenType::Marker => 1.0,
            PenType::Pencil | PenType::Fountain | PenType::Brush => {
                let normalized = if pressure.is_nan() {
                    0.0
                } else {
                    (pressure / self.max_pressure).clamp(0.0, 1.0)
                };
                let eased = match pen {
                    // Brushes swell faster at light pressure
                    PenType::Brush => normalized.sqrt(),
                    _ => normalized,
                };
                self.min_factor + (1.0 - self.min_factor) * eased
            }
        }
    }

    /// Effective rendered width for a sample.
    pub fn width(&self, pen: PenType, base_width: f64, pressure: f64) -> f64 {
        base_width * self.factor(pen, pressure)
    }
}
