//! Page state shared between the input worker and the renderer.

use crate::mode::Mode;
use crate::select::SelectionState;
use crate::store::StrokeStore;
use kurbo::{Point, Rect};
use std::sync::{Arc, RwLock};

/// Page state guarded by a single lock so a repaint never observes a half-applied mutation.
pub type SharedPage = Arc<RwLock<Page>>;

/// One scrollable page of strokes.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub id: String,
    scroll_offset: i32,
    pub strokes: StrokeStore,
    pub mode: Mode,
    /// Present only while `mode` is `Select`.
    pub selection: Option<SelectionState>,
}

impl Page {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_store(id, StrokeStore::new())
    }

    pub fn with_store(id: impl Into<String>, strokes: StrokeStore) -> Self {
        Self {
            id: id.into(),
            scroll_offset: 0,
            strokes,
            mode: Mode::default(),
            selection: None,
        }
    }

    pub fn into_shared(self) -> SharedPage {
        Arc::new(RwLock::new(self))
    }

    pub fn scroll_offset(&self) -> i32 {
        self.scroll_offset
    }

    /// Set by the scrolling collaborator. Negative offsets are clamped to the page top.
    pub fn set_scroll_offset(&mut self, offset: i32) {
        self.scroll_offset = offset.max(0);
    }

    /// Screen space to page space: `page_y = screen_y + scroll`.
    pub fn screen_to_page(&self, point: Point) -> Point {
        Point::new(point.x, point.y + f64::from(self.scroll_offset))
    }

    /// Page space to screen space: `screen_y = page_y - scroll`.
    pub fn page_to_screen(&self, point: Point) -> Point {
        Point::new(point.x, point.y - f64::from(self.scroll_offset))
    }

    pub fn page_rect_to_screen(&self, rect: Rect) -> Rect {
        let dy = f64::from(self.scroll_offset);
        Rect::new(rect.x0, rect.y0 - dy, rect.x1, rect.y1 - dy)
    }

    /// The page-space rectangle currently visible in a viewport of `size`.
    pub fn visible_rect(&self, width: f64, height: f64) -> Rect {
        let top = f64::from(self.scroll_offset);
        Rect::new(0.0, top, width, top + height)
    }
}
