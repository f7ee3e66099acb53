//! Editor configuration.

use crate::error::{EditorError, EditorResult};
use crate::mode::Eraser;
use crate::pen::PressureCurve;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables of the editing engine. Every field has a default, so a partial JSON document
/// is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Inactivity window before pending strokes are committed as one undo group.
    pub debounce_ms: u64,
    pub max_undo_history: usize,
    /// Device maximum pressure; pressure at or above it gives full width.
    pub max_pressure: f64,
    /// Width factor at zero pressure for pressure-sensitive pens.
    pub min_pressure_factor: f64,
    pub default_eraser_radius: f64,
    /// Edge length of a spatial index cell in page units.
    pub spatial_cell_size: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            max_undo_history: crate::history::MAX_UNDO_HISTORY,
            max_pressure: 4096.0,
            min_pressure_factor: 0.4,
            default_eraser_radius: 15.0,
            spatial_cell_size: crate::store::DEFAULT_CELL_SIZE,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> EditorResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| EditorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EditorResult<()> {
        if self.max_undo_history == 0 {
            return Err(EditorError::Config("max_undo_history must be at least 1".into()));
        }
        if !(self.max_pressure > 0.0) {
            return Err(EditorError::Config("max_pressure must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.min_pressure_factor) {
            return Err(EditorError::Config("min_pressure_factor must be within 0..=1".into()));
        }
        if !(self.default_eraser_radius > 0.0) {
            return Err(EditorError::Config("default_eraser_radius must be positive".into()));
        }
        if !(self.spatial_cell_size > 0.0) {
            return Err(EditorError::Config("spatial_cell_size must be positive".into()));
        }
        Ok(())
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn pressure_curve(&self) -> PressureCurve {
        PressureCurve::new(self.max_pressure, self.min_pressure_factor)
    }

    pub fn default_eraser(&self) -> Eraser {
        Eraser::Stroke {
            radius: self.default_eraser_radius,
        }
    }
}
