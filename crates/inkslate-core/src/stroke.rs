//! Persisted stroke model.

use crate::geometry::{bounds_of, distance_to_polyline};
use kurbo::{BezPath, Point, Rect, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a stroke.
pub type StrokeId = Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub const fn gray() -> Self {
        Self::new(128, 128, 128, 255)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }
}

impl Default for SerializableColor {
    fn default() -> Self {
        Self::black()
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Pen kinds offered by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PenType {
    #[default]
    Ballpen,
    Pencil,
    Marker,
    Fountain,
    Brush,
}

/// One captured pen sample in page space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    /// Raw device pressure.
    pub pressure: f64,
    /// Capture time in milliseconds.
    pub timestamp: i64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64, pressure: f64, timestamp: i64) -> Self {
        Self { x, y, pressure, timestamp }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Linear interpolation between two samples.
    pub fn lerp(&self, other: &StrokePoint, t: f64) -> StrokePoint {
        StrokePoint {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            pressure: self.pressure + (other.pressure - self.pressure) * t,
            timestamp: self.timestamp + ((other.timestamp - self.timestamp) as f64 * t).round() as i64,
        }
    }
}

/// A committed stroke. Points are in page space and never depend on the scroll offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub(crate) id: StrokeId,
    pub pen: PenType,
    pub color: SerializableColor,
    pub base_width: f64,
    pub points: Vec<StrokePoint>,
}

impl Stroke {
    /// Minimum number of points for a committed stroke.
    pub const MIN_POINTS: usize = 2;

    /// Create a stroke with a fresh id.
    pub fn new(pen: PenType, color: SerializableColor, base_width: f64, points: Vec<StrokePoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pen,
            color,
            base_width,
            points,
        }
    }

    /// Create a new stroke (fresh id) that keeps this stroke's pen, color and width.
    pub fn derive(&self, points: Vec<StrokePoint>) -> Self {
        Self::new(self.pen, self.color, self.base_width, points)
    }

    pub fn id(&self) -> StrokeId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Whether the width and every sample are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.base_width.is_finite()
            && self
                .points
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite() && p.pressure.is_finite())
    }

    pub fn positions(&self) -> impl Iterator<Item = Point> + '_ {
        self.points.iter().map(StrokePoint::position)
    }

    /// Bounds of the centerline, without stroke width.
    pub fn bounds(&self) -> Rect {
        bounds_of(self.positions()).unwrap_or(Rect::ZERO)
    }

    /// Bounds inflated by half of the widest possible rendered width.
    pub fn paint_bounds(&self) -> Rect {
        let pad = self.base_width / 2.0 + 1.0;
        self.bounds().inflate(pad, pad)
    }

    /// Check if a point lies within `tolerance` of the centerline.
    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let positions: Vec<Point> = self.positions().collect();
        distance_to_polyline(point, &positions) <= tolerance + self.base_width / 2.0
    }

    pub fn to_path(&self) -> BezPath {
        let mut path = BezPath::new();
        let mut positions = self.positions();
        if let Some(first) = positions.next() {
            path.move_to(first);
            for point in positions {
                path.line_to(point);
            }
        }
        path
    }

    /// Translate every point by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        for point in &mut self.points {
            point.x += delta.x;
            point.y += delta.y;
        }
    }
}
