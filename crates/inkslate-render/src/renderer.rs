//! Render settings and errors.

use inkslate_core::{EditorError, PressureCurve};
use peniko::Color;
use std::sync::Arc;
use thiserror::Error;

/// Renderer errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Invalid frame size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("Font error: {0}")]
    Font(String),
}

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RendererError>;

impl From<RendererError> for EditorError {
    fn from(err: RendererError) -> Self {
        match err {
            RendererError::Surface(reason) => EditorError::DisplaySurfaceUnavailable(reason),
            other => EditorError::DisplaySurfaceUnavailable(other.to_string()),
        }
    }
}

/// Metrics for overlay text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    /// Font size in pixels.
    pub font_size: f64,
    /// Horizontal inset on both sides of a message.
    pub left_margin: f64,
    /// Page-space y of the first message.
    pub top_offset: f64,
    /// Line height as a multiple of the font size.
    pub line_height: f64,
    /// Gap between messages as a multiple of the line height.
    pub message_spacing: f64,
    pub color: Color,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 40.0,
            left_margin: 40.0,
            top_offset: 60.0,
            line_height: 1.2,
            message_spacing: 0.5,
            color: Color::from_rgba8(0, 0, 0, 255),
        }
    }
}

impl TextStyle {
    pub fn line_height_px(&self) -> f64 {
        self.font_size * self.line_height
    }
}

/// Loading spinner geometry, in screen pixels around the viewport center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinnerStyle {
    pub radius: f64,
    pub stroke_width: f64,
    /// Arc length in degrees.
    pub sweep: f64,
    pub color: Color,
}

impl Default for SpinnerStyle {
    fn default() -> Self {
        Self {
            radius: 50.0,
            stroke_width: 5.0,
            sweep: 270.0,
            color: Color::from_rgba8(128, 128, 128, 255),
        }
    }
}

/// Settings shared by every frame.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Page background.
    pub background_color: Color,
    /// Lasso boundary color.
    pub selection_color: Color,
    pub selection_width: f64,
    /// Must match the curve the editor was configured with.
    pub pressure: PressureCurve,
    pub text: TextStyle,
    pub spinner: SpinnerStyle,
    /// TrueType or OpenType data used for overlay text. Without it each line is drawn as a bar.
    pub font: Option<Arc<Vec<u8>>>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            background_color: Color::from_rgba8(255, 255, 255, 255),
            selection_color: Color::from_rgba8(128, 128, 128, 255),
            selection_width: 3.0,
            pressure: PressureCurve::default(),
            text: TextStyle::default(),
            spinner: SpinnerStyle::default(),
            font: None,
        }
    }
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the background color.
    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Set the lasso boundary color.
    pub fn with_selection_color(mut self, color: Color) -> Self {
        self.selection_color = color;
        self
    }

    pub fn with_pressure(mut self, pressure: PressureCurve) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_text_style(mut self, text: TextStyle) -> Self {
        self.text = text;
        self
    }

    pub fn with_spinner(mut self, spinner: SpinnerStyle) -> Self {
        self.spinner = spinner;
        self
    }

    /// Use `data` for overlay text. Fails if it is not a parseable font.
    pub fn with_font(mut self, data: Vec<u8>) -> RenderResult<Self> {
        ttf_parser::Face::parse(&data, 0).map_err(|e| RendererError::Font(e.to_string()))?;
        self.font = Some(Arc::new(data));
        Ok(self)
    }
}

/// Convert a peniko color to a tiny-skia one.
pub(crate) fn skia_color(color: Color) -> tiny_skia::Color {
    let rgba = color.to_rgba8();
    tiny_skia::Color::from_rgba8(rgba.r, rgba.g, rgba.b, rgba.a)
}
