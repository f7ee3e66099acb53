//! Eraser hit-testing and stroke removal.

use crate::geometry::{bounds_of, close_polygon, distance_to_polyline, polygon_contains, segment_distance, union_rects};
use crate::history::{Edit, Operation};
use crate::mode::Eraser;
use crate::page::Page;
use crate::store::{PlacedStroke, StrokeStore};
use crate::stroke::{Stroke, StrokeId, StrokePoint};
use kurbo::Point;

/// Erase along `path` (page space) with `eraser`.
///
/// Strokes are only examined when their paint bounds overlap the eraser path bounds
/// inflated by the radius. Erasing empty space yields an empty edit.
pub fn erase(page: &mut Page, path: &[Point], eraser: Eraser) -> Edit {
    if path.is_empty() {
        return Edit::default();
    }
    let edit = match eraser {
        Eraser::Stroke { radius } => {
            let hits = strokes_touched(&page.strokes, path, radius);
            remove_whole(&mut page.strokes, hits)
        }
        Eraser::Area { radius } => erase_area(&mut page.strokes, path, radius),
        Eraser::Lasso => {
            let hits = strokes_enclosed(&page.strokes, path);
            remove_whole(&mut page.strokes, hits)
        }
    };
    if !edit.is_empty() {
        log::debug!("Eraser {:?} over {} points changed {:?}", eraser, path.len(), edit.dirty);
    }
    edit
}

/// Ids of strokes with a segment within `radius` of any eraser segment, in paint order.
fn strokes_touched(store: &StrokeStore, path: &[Point], radius: f64) -> Vec<StrokeId> {
    let Some(bounds) = bounds_of(path.iter().copied()) else {
        return Vec::new();
    };
    store
        .query_region(bounds.inflate(radius, radius))
        .into_iter()
        .filter(|stroke| touches(stroke, path, radius))
        .map(Stroke::id)
        .collect()
}

fn touches(stroke: &Stroke, path: &[Point], radius: f64) -> bool {
    let positions: Vec<Point> = stroke.positions().collect();
    eraser_segments(path).any(|(e0, e1)| {
        positions
            .windows(2)
            .any(|s| segment_distance(e0, e1, s[0], s[1]) <= radius)
    })
}

/// Sample-to-sample segments of the eraser path. A single sample is a zero-length segment.
fn eraser_segments(path: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let single = (path.len() == 1).then(|| (path[0], path[0]));
    single
        .into_iter()
        .chain(path.windows(2).map(|w| (w[0], w[1])))
}

/// Ids of strokes with at least one point inside the closed lasso, in paint order.
fn strokes_enclosed(store: &StrokeStore, lasso: &[Point]) -> Vec<StrokeId> {
    let polygon = close_polygon(lasso);
    let Some(bounds) = bounds_of(polygon.iter().copied()) else {
        return Vec::new();
    };
    store
        .query_region(bounds)
        .into_iter()
        .filter(|stroke| stroke.positions().any(|p| polygon_contains(&polygon, p)))
        .map(Stroke::id)
        .collect()
}

fn remove_whole(store: &mut StrokeStore, ids: Vec<StrokeId>) -> Edit {
    let mut dirty = None;
    let mut removed: Vec<PlacedStroke> = Vec::with_capacity(ids.len());
    for id in ids.into_iter().rev() {
        if let Some(placed) = store.remove(id) {
            dirty = union_rects(dirty, Some(placed.stroke.paint_bounds()));
            removed.push(placed);
        }
    }
    if removed.is_empty() {
        return Edit::default();
    }
    Edit {
        operations: vec![Operation::DeleteStrokes(removed)],
        dirty,
    }
}

fn erase_area(store: &mut StrokeStore, path: &[Point], radius: f64) -> Edit {
    let mut dirty = None;
    let mut removed = Vec::new();
    let mut survivors = Vec::new();

    for id in strokes_touched(store, path, radius).into_iter().rev() {
        let Some(stroke) = store.get(id) else {
            continue;
        };
        let Some(pieces) = split_stroke(stroke, path, radius) else {
            continue;
        };
        if let Some(placed) = store.remove(id) {
            dirty = union_rects(dirty, Some(placed.stroke.paint_bounds()));
            removed.push(placed);
            survivors.extend(pieces);
        }
    }

    if removed.is_empty() {
        return Edit::default();
    }
    // Survivors go on top, in the order their originals were painted
    survivors.reverse();
    for stroke in &survivors {
        store.add(stroke.clone());
    }

    let mut operations = vec![Operation::DeleteStrokes(removed)];
    if !survivors.is_empty() {
        operations.push(Operation::AddStrokes(survivors));
    }
    Edit { operations, dirty }
}

/// Cut the part of `stroke` within `radius` of the eraser path.
///
/// The stroke is densified so no two consecutive points are more than `radius / 2` apart,
/// every point within `radius` of the eraser is dropped, and each remaining run of at least
/// two points becomes a new stroke with the original style. Returns `None` when no point
/// falls within reach, so the stroke is left alone.
pub fn split_stroke(stroke: &Stroke, path: &[Point], radius: f64) -> Option<Vec<Stroke>> {
    let dense = densify(&stroke.points, radius / 2.0);
    let erased: Vec<bool> = dense
        .iter()
        .map(|p| distance_to_polyline(p.position(), path) <= radius)
        .collect();
    if !erased.iter().any(|&e| e) {
        return None;
    }

    let mut pieces = Vec::new();
    let mut run: Vec<StrokePoint> = Vec::new();
    for (point, gone) in dense.into_iter().zip(erased) {
        if gone {
            if run.len() >= Stroke::MIN_POINTS {
                pieces.push(stroke.derive(std::mem::take(&mut run)));
            }
            run.clear();
        } else {
            run.push(point);
        }
    }
    if run.len() >= Stroke::MIN_POINTS {
        pieces.push(stroke.derive(run));
    }
    Some(pieces)
}

/// Insert interpolated points so consecutive points are at most `step` apart.
fn densify(points: &[StrokePoint], step: f64) -> Vec<StrokePoint> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    if !(step > 0.0) {
        return points.to_vec();
    }

    let mut dense = vec![*first];
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let length = a.position().distance(b.position());
        let steps = (length / step).ceil().max(1.0) as usize;
        for i in 1..=steps {
            dense.push(a.lerp(&b, i as f64 / steps as f64));
        }
    }
    dense
}
