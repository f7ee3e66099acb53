//! Inkslate Render Library
//!
//! Dirty-region rendering of an inkslate page onto a display surface. Strokes are rasterized
//! on the CPU with tiny-skia. Overlay text is shaped and broken into lines with parley and
//! filled from TrueType outlines.

mod engine;
mod raster;
mod renderer;
pub mod surface;
pub mod text;

pub use engine::{FrameOutcome, FrameStats, RenderEngine};
pub use renderer::{RenderResult, RenderSettings, RendererError, SpinnerStyle, TextStyle};
pub use surface::{DisplaySurface, MemorySurface, PixelRect, Post};
