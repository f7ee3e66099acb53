//! Headless application: replays a script through a session and captures the final frame.

use crate::script::{Script, Step};
use inkslate_core::{
    EditorConfig, EditorError, FilePersistence, OverlayFeed, Page, RepaintRequest, RepaintSink, Session,
    StrokePersistence,
};
use inkslate_render::{DisplaySurface, MemorySurface, RenderEngine, RenderSettings, RendererError};
use kurbo::Vec2;
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Editor(#[from] EditorError),
    #[error(transparent)]
    Render(#[from] RendererError),
    #[error("PNG encoding failed: {0}")]
    Png(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Application configuration, read from an optional JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    pub page_id: String,
    /// CSS-style hex color, e.g. `"#ffffff"`.
    pub background: String,
    /// Directory for page files. Strokes are not persisted when unset.
    pub storage_dir: Option<PathBuf>,
    /// TrueType/OpenType font for overlay text.
    pub font: Option<PathBuf>,
    pub editor: EditorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 1404,
            height: 1872,
            page_id: "default".to_string(),
            background: "#ffffff".to_string(),
            storage_dir: None,
            font: None,
            editor: EditorConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json(json: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.editor.validate()?;
        Ok(config)
    }

    fn render_settings(&self) -> AppResult<RenderSettings> {
        let background = parse_color(&self.background)
            .ok_or_else(|| AppError::Config(format!("unrecognized color {:?}", self.background)))?;
        let settings = RenderSettings::new()
            .with_background(background)
            .with_pressure(self.editor.pressure_curve());
        match &self.font {
            Some(path) => Ok(settings.with_font(std::fs::read(path)?)?),
            None => Ok(settings),
        }
    }
}

/// The last frame posted to the display.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: Vec<u8>,
}

impl Frame {
    /// Encode the frame as PNG bytes.
    pub fn to_png(&self) -> AppResult<Vec<u8>> {
        encode_png(&self.pixels, self.width, self.height)
    }

    pub fn write_png(&self, path: &Path) -> AppResult<()> {
        std::fs::write(path, self.to_png()?)?;
        log::info!("Wrote {}x{} frame to {}", self.width, self.height, path.display());
        Ok(())
    }
}

/// Session wired to a render engine over an in-memory display.
pub struct App {
    session: Session,
    engine: Arc<RenderEngine<MemorySurface>>,
    storage: Option<Arc<FilePersistence>>,
    config: AppConfig,
}

impl App {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let page = Page::new(config.page_id.clone()).into_shared();
        let overlay = OverlayFeed::new().into_shared();
        let surface = MemorySurface::new(config.width, config.height)?;
        let engine = Arc::new(RenderEngine::new(
            surface,
            page.clone(),
            overlay.clone(),
            config.render_settings()?,
        ));

        let storage = match &config.storage_dir {
            Some(dir) => Some(Arc::new(FilePersistence::new(dir.clone()).map_err(EditorError::from)?)),
            None => None,
        };

        let mut builder = Session::builder()
            .config(config.editor)
            .shared_page(page)
            .shared_overlay(overlay)
            .repaint_sink(engine.clone());
        if let Some(storage) = &storage {
            builder = builder.persistence(storage.clone());
        }
        let app = Self {
            session: builder.build()?,
            engine,
            storage,
            config,
        };

        if app.storage.is_some() {
            let page_id = app.config.page_id.clone();
            app.load(&page_id)?;
        }
        Ok(app)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Page ids found in the storage directory.
    pub fn stored_pages(&self) -> AppResult<Vec<String>> {
        match &self.storage {
            Some(storage) => Ok(pollster::block_on(storage.list_pages()).map_err(EditorError::from)?),
            None => Ok(Vec::new()),
        }
    }

    fn load(&self, page_id: &str) -> AppResult<()> {
        let handle = self.session.load_page(page_id)?;
        handle.join().map_err(|_| EditorError::WorkerStopped)??;
        self.session.sync()?;
        Ok(())
    }

    /// Apply one step. Editing steps are queued to the session worker; page loads wait for it.
    pub fn apply(&self, step: &Step) -> AppResult<()> {
        log::debug!("Replaying {:?}", step);
        match step {
            Step::Mode { mode } => self.session.set_mode(*mode)?,
            Step::Pen { pen } => self.session.set_pen(*pen),
            Step::Eraser { eraser } => self.session.set_eraser(*eraser),
            Step::Gesture { points } => self.session.submit(Step::samples(points))?,
            Step::Undo => self.session.undo()?,
            Step::Redo => self.session.redo()?,
            Step::Scroll { offset } => self.session.set_scroll(*offset)?,
            Step::MoveSelection { dx, dy } => self.session.move_selection(Vec2::new(*dx, *dy))?,
            Step::CutSelection => self.session.cut_selection()?,
            Step::CommitSelection => self.session.commit_selection()?,
            Step::Commit => self.session.commit()?,
            Step::Load { page_id } => self.load(page_id)?,
            Step::DeletePage { page_id } => self.session.delete_page(page_id)?,
            Step::Wait { ms } => std::thread::sleep(Duration::from_millis(*ms)),
        }
        Ok(())
    }

    /// Replay every step, commit what is pending and capture the final frame.
    pub fn replay(&self, script: &Script) -> AppResult<Frame> {
        for step in &script.steps {
            self.apply(step)?;
        }
        self.session.commit()?;
        self.session.sync()?;
        log::info!(
            "Replayed {} steps, {} undo groups",
            script.steps.len(),
            self.session.undo_depth()
        );
        Ok(self.capture())
    }

    /// Full repaint, then copy the display contents.
    pub fn capture(&self) -> Frame {
        self.engine.request_repaint(RepaintRequest::full());
        self.engine.with_surface(|surface| {
            let (width, height) = surface.size();
            Frame {
                width,
                height,
                pixels: surface.pixels().to_vec(),
            }
        })
    }
}

/// Encode RGBA pixel data to PNG bytes.
fn encode_png(rgba_data: &[u8], width: u32, height: u32) -> AppResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut png_data, width, height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder
            .write_header()
            .map_err(|e| AppError::Png(e.to_string()))?;
        writer
            .write_image_data(rgba_data)
            .map_err(|e| AppError::Png(e.to_string()))?;
    }
    Ok(png_data)
}

/// Parse a `#rrggbb` or `#rrggbbaa` color.
fn parse_color(s: &str) -> Option<Color> {
    let hex = s.trim().strip_prefix('#')?;
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, 255)),
        8 => Some(Color::from_rgba8(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000"), Some(Color::from_rgba8(255, 0, 0, 255)));
        assert_eq!(parse_color(" #00000080 "), Some(Color::from_rgba8(0, 0, 0, 128)));
        assert_eq!(parse_color("red"), None);
        assert_eq!(parse_color("#12345"), None);
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config = AppConfig::from_json(r#"{"width": 300, "editor": {"debounce_ms": 20}}"#).unwrap();
        assert_eq!(config.width, 300);
        assert_eq!(config.height, AppConfig::default().height);
        assert_eq!(config.editor.debounce_ms, 20);
        assert_eq!(config.editor.max_undo_history, 50);
    }

    #[test]
    fn test_invalid_editor_config_rejected() {
        let result = AppConfig::from_json(r#"{"editor": {"max_pressure": 0}}"#);
        assert!(matches!(result, Err(AppError::Editor(EditorError::Config(_)))));
    }

    #[test]
    fn test_png_header() {
        let png = encode_png(&[255; 2 * 2 * 4], 2, 2).unwrap();
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    }
}
