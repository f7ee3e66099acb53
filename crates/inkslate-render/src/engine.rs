//! Repaint scheduling and frame composition.

use crate::raster::{self, DIRTY_PAD};
use crate::renderer::{RenderResult, RenderSettings, RendererError};
use crate::surface::{DisplaySurface, PixelRect};
use crate::text::{TextLayouter, draw_blocks, visible_blocks};
use inkslate_core::{EditorError, Mode, OverlayFeed, Page, RepaintRequest, RepaintSink, SharedOverlay, SharedPage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tiny_skia::Pixmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineState {
    Idle,
    Rendering,
}

/// Requests that arrive while a frame is being rendered are merged into `pending`.
#[derive(Debug)]
struct Schedule {
    state: EngineState,
    pending: Option<RepaintRequest>,
}

/// Frame counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames handed to the display.
    pub posted: u64,
    /// Frames dropped because the display was unavailable.
    pub skipped: u64,
    /// Requests merged into a pending frame instead of rendering on their own.
    pub coalesced: u64,
}

/// What happened to one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Posted,
    /// The dirty region was entirely outside the viewport.
    Offscreen,
}

/// The surface plus the rasters kept between frames.
struct FrameTarget<S> {
    surface: S,
    /// Strokes only, kept in sync with the page at `rendered_scroll`.
    strokes: Option<Pixmap>,
    /// Strokes plus overlays, the frame last handed to the surface.
    composed: Option<Pixmap>,
    rendered_scroll: Option<i32>,
    /// The last post failed, so the surface holds an older frame.
    surface_stale: bool,
}

impl<S: DisplaySurface> FrameTarget<S> {
    fn new(surface: S) -> Self {
        Self {
            surface,
            strokes: None,
            composed: None,
            rendered_scroll: None,
            surface_stale: true,
        }
    }

    /// Allocate the rasters for the current surface size. Returns true when they were recreated.
    fn ensure_size(&mut self) -> RenderResult<bool> {
        let (width, height) = self.surface.size();
        let matches = self
            .strokes
            .as_ref()
            .is_some_and(|p| p.width() == width && p.height() == height);
        if matches {
            return Ok(false);
        }
        let invalid = || RendererError::InvalidSize { width, height };
        self.strokes = Some(Pixmap::new(width, height).ok_or_else(invalid)?);
        self.composed = Some(Pixmap::new(width, height).ok_or_else(invalid)?);
        self.rendered_scroll = None;
        self.surface_stale = true;
        log::debug!("Allocated {}x{} frame rasters", width, height);
        Ok(true)
    }

    fn render(
        &mut self,
        request: RepaintRequest,
        page: &Page,
        overlay: &OverlayFeed,
        settings: &RenderSettings,
    ) -> RenderResult<FrameOutcome> {
        self.ensure_size()?;
        let scroll = page.scroll_offset();
        let (Some(strokes), Some(composed)) = (self.strokes.as_mut(), self.composed.as_mut()) else {
            return Err(RendererError::Surface("frame rasters not allocated".into()));
        };
        let (width, height) = (strokes.width(), strokes.height());

        // A scroll change moves every pixel, so the stroke raster is redrawn in full
        let region = match request.dirty {
            Some(dirty) if self.rendered_scroll == Some(scroll) => {
                match PixelRect::covering(page.page_rect_to_screen(dirty), DIRTY_PAD).clamp(width, height) {
                    Some(region) => Some(region),
                    None => return Ok(FrameOutcome::Offscreen),
                }
            }
            _ => None,
        };

        raster::clear(strokes, region, settings.background_color);
        raster::draw_strokes(strokes, page, region, settings);
        self.rendered_scroll = Some(scroll);

        composed.data_mut().copy_from_slice(strokes.data());
        compose_overlays(composed, page, overlay, settings);

        let post_region = if self.surface_stale { None } else { region };
        let buffer = match self.surface.lock() {
            Ok(buffer) => buffer,
            Err(e) => {
                self.surface_stale = true;
                return Err(e);
            }
        };
        raster::blit(composed, buffer, post_region);
        self.surface.unlock_and_post(request.refresh, post_region)?;
        self.surface_stale = false;
        Ok(FrameOutcome::Posted)
    }
}

/// Draw the selection boundary, overlay text and spinner on top of the strokes.
fn compose_overlays(frame: &mut Pixmap, page: &Page, overlay: &OverlayFeed, settings: &RenderSettings) {
    let scroll = f64::from(page.scroll_offset());
    if page.mode == Mode::Select {
        if let Some(selection) = &page.selection {
            raster::draw_selection(frame, &selection.boundary, scroll, settings);
        }
    }

    let lines = overlay.display_lines();
    if !lines.is_empty() {
        let (width, height) = (f64::from(frame.width()), f64::from(frame.height()));
        let blocks = TextLayouter::new(settings.font.clone()).layout_messages(&lines, &settings.text, width);
        let visible = page.visible_rect(width, height);
        let font = settings.font.as_deref().map(Vec::as_slice);
        draw_blocks(frame, visible_blocks(&blocks, visible), scroll, &settings.text, font);
    }

    if overlay.is_loading() {
        raster::draw_spinner(frame, overlay.spinner_angle(), settings);
    }
}

/// Renders the shared page onto a display surface.
///
/// Requests are rendered on the calling thread. A request made while another thread is
/// rendering is merged into a single pending request, rendered by that thread before it
/// returns to idle. Lock order is surface, then page, then overlay.
pub struct RenderEngine<S> {
    page: SharedPage,
    overlay: SharedOverlay,
    settings: RenderSettings,
    schedule: Mutex<Schedule>,
    target: Mutex<FrameTarget<S>>,
    posted: AtomicU64,
    skipped: AtomicU64,
    coalesced: AtomicU64,
}

impl<S: DisplaySurface> RenderEngine<S> {
    pub fn new(surface: S, page: SharedPage, overlay: SharedOverlay, settings: RenderSettings) -> Self {
        Self {
            page,
            overlay,
            settings,
            schedule: Mutex::new(Schedule {
                state: EngineState::Idle,
                pending: None,
            }),
            target: Mutex::new(FrameTarget::new(surface)),
            posted: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn stats(&self) -> FrameStats {
        FrameStats {
            posted: self.posted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Run `f` with exclusive access to the surface. Blocks while a frame is rendering.
    pub fn with_surface<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock_target().surface)
    }

    fn lock_target(&self) -> MutexGuard<'_, FrameTarget<S>> {
        self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render one frame for `request` now.
    pub fn render_frame(&self, request: RepaintRequest) -> RenderResult<FrameOutcome> {
        let mut target = self.lock_target();
        let page = self.page.read().unwrap_or_else(PoisonError::into_inner);
        let overlay = self.overlay.read().unwrap_or_else(PoisonError::into_inner);
        target.render(request, &page, &overlay, &self.settings)
    }

    fn render_logged(&self, request: RepaintRequest) {
        match self.render_frame(request) {
            Ok(FrameOutcome::Posted) => {
                self.posted.fetch_add(1, Ordering::Relaxed);
            }
            Ok(FrameOutcome::Offscreen) => {
                log::trace!("Dirty region {:?} is off screen", request.dirty);
            }
            Err(e @ RendererError::Surface(_)) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Skipping frame: {}", EditorError::from(e));
            }
            Err(e) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                log::error!("Frame failed: {}", e);
            }
        }
    }
}

impl<S: DisplaySurface> RepaintSink for RenderEngine<S> {
    fn request_repaint(&self, request: RepaintRequest) {
        {
            let mut schedule = self.lock_schedule();
            match schedule.state {
                EngineState::Rendering => {
                    schedule.pending = Some(match schedule.pending {
                        Some(pending) => pending.merge(request),
                        None => request,
                    });
                    self.coalesced.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                EngineState::Idle => schedule.state = EngineState::Rendering,
            }
        }

        let mut next = Some(request);
        while let Some(request) = next {
            self.render_logged(request);
            let mut schedule = self.lock_schedule();
            next = schedule.pending.take();
            if next.is_none() {
                schedule.state = EngineState::Idle;
            }
        }
    }
}
