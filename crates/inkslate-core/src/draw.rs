//! Turns a pen-down to pen-up batch of samples into a committed stroke.

use crate::error::{EditorError, EditorResult};
use crate::history::{Edit, Operation};
use crate::page::Page;
use crate::pen::PenStyle;
use crate::stroke::{Stroke, StrokePoint};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// A raw pen sample in screen space as delivered by the digitizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    /// Capture time in milliseconds.
    pub timestamp: i64,
}

impl RawSample {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp: i64) -> Self {
        Self { x, y, pressure, timestamp }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Positions of `samples` translated to page space.
pub fn page_points(page: &Page, samples: &[RawSample]) -> Vec<Point> {
    samples.iter().map(|s| page.screen_to_page(s.position())).collect()
}

/// Build a stroke from `samples` and append it to the page.
///
/// Gestures with fewer than two samples are rejected with `MalformedGesture` and leave the
/// page untouched.
pub fn draw(page: &mut Page, samples: &[RawSample], pen: &PenStyle) -> EditorResult<Edit> {
    if samples.len() < Stroke::MIN_POINTS {
        return Err(EditorError::MalformedGesture {
            samples: samples.len(),
        });
    }

    let points = samples
        .iter()
        .map(|s| {
            let p = page.screen_to_page(s.position());
            StrokePoint::new(p.x, p.y, s.pressure, s.timestamp)
        })
        .collect();
    let stroke = Stroke::new(pen.pen, pen.color, pen.width, points);
    let dirty = stroke.paint_bounds();

    log::debug!("Drew stroke {} with {} points", stroke.id(), stroke.len());
    page.strokes.add(stroke.clone());

    Ok(Edit {
        operations: vec![Operation::AddStrokes(vec![stroke])],
        dirty: Some(dirty),
    })
}
