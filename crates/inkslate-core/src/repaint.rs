//! Repaint requests and the sink that receives them.

use crate::geometry::union_rects;
use kurbo::Rect;
use serde::{Deserialize, Serialize};

/// How the display should refresh a posted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshMode {
    /// Fast, low-latency update of the changed pixels. May leave ghosting.
    Partial,
    /// Slow flashing refresh that clears ghosting.
    Full,
}

/// A request to bring the display up to date with the page.
///
/// There is no default refresh mode: every caller names one through [`RepaintRequest::partial`]
/// or [`RepaintRequest::full`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepaintRequest {
    /// Page-space region that changed. `None` repaints the whole viewport.
    pub dirty: Option<Rect>,
    pub refresh: RefreshMode,
}

impl RepaintRequest {
    pub fn partial(dirty: Option<Rect>) -> Self {
        Self {
            dirty,
            refresh: RefreshMode::Partial,
        }
    }

    pub fn full() -> Self {
        Self {
            dirty: None,
            refresh: RefreshMode::Full,
        }
    }

    /// Merge two requests: regions are unioned, a whole-viewport request absorbs any region,
    /// and a full refresh wins over a partial one.
    pub fn merge(self, other: RepaintRequest) -> RepaintRequest {
        let dirty = match (self.dirty, other.dirty) {
            (None, _) | (_, None) => None,
            (a, b) => union_rects(a, b),
        };
        let refresh = if self.refresh == RefreshMode::Full || other.refresh == RefreshMode::Full {
            RefreshMode::Full
        } else {
            RefreshMode::Partial
        };
        RepaintRequest { dirty, refresh }
    }
}

/// Receiver of repaint requests, implemented by the render engine.
///
/// Callers must not hold the page lock while calling `request_repaint`.
pub trait RepaintSink: Send + Sync {
    fn request_repaint(&self, request: RepaintRequest);
}

/// Sink that drops every request. Used when running without a display.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RepaintSink for NullSink {
    fn request_repaint(&self, _request: RepaintRequest) {}
}
