//! Ordered stroke collection with a spatial index.

use crate::stroke::{Stroke, StrokeId};
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default edge length of a spatial index cell, in page units.
pub const DEFAULT_CELL_SIZE: f64 = 256.0;

/// A stroke together with its position in the store's paint order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedStroke {
    pub index: usize,
    pub stroke: Stroke,
}

/// Rectangles covering more grid cells than this are not bucketed.
const MAX_INDEXED_CELLS: f64 = 65_536.0;

/// Uniform grid over page space mapping cells to the strokes whose paint bounds touch them.
///
/// Strokes too large (or too far out) to bucket are kept in `oversized` and are a candidate
/// for every query.
#[derive(Debug, Clone)]
struct GridIndex {
    cell_size: f64,
    cells: HashMap<(i64, i64), HashSet<StrokeId>>,
    oversized: HashSet<StrokeId>,
}

impl GridIndex {
    fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size > 0.0 { cell_size } else { DEFAULT_CELL_SIZE },
            cells: HashMap::new(),
            oversized: HashSet::new(),
        }
    }

    /// Cells covered by `rect`, or `None` when it cannot be bucketed.
    fn cell_range(&self, rect: Rect) -> Option<impl Iterator<Item = (i64, i64)> + use<>> {
        let cell = |v: f64| (v / self.cell_size).floor();
        let (x0, x1, y0, y1) = (cell(rect.x0), cell(rect.x1), cell(rect.y0), cell(rect.y1));
        if ![x0, x1, y0, y1].iter().all(|v| v.is_finite()) {
            return None;
        }
        if (x1 - x0 + 1.0).max(0.0) * (y1 - y0 + 1.0).max(0.0) > MAX_INDEXED_CELLS {
            return None;
        }
        let (x0, x1, y0, y1) = (x0 as i64, x1 as i64, y0 as i64, y1 as i64);
        Some((y0..=y1).flat_map(move |cy| (x0..=x1).map(move |cx| (cx, cy))))
    }

    fn insert(&mut self, id: StrokeId, bounds: Rect) {
        match self.cell_range(bounds) {
            Some(cells) => {
                for cell in cells {
                    self.cells.entry(cell).or_default().insert(id);
                }
            }
            None => {
                self.oversized.insert(id);
            }
        }
    }

    fn remove(&mut self, id: StrokeId, bounds: Rect) {
        self.oversized.remove(&id);
        for cell in self.cell_range(bounds).into_iter().flatten() {
            if let Some(ids) = self.cells.get_mut(&cell) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
    }

    /// Strokes that may touch `region`. `None` means every stroke is a candidate.
    fn candidates(&self, region: Rect) -> Option<HashSet<StrokeId>> {
        let cells = self.cell_range(region)?;
        let mut found = self.oversized.clone();
        for cell in cells {
            if let Some(ids) = self.cells.get(&cell) {
                found.extend(ids.iter().copied());
            }
        }
        Some(found)
    }

    fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
    }
}

/// Owns the strokes of one page in paint order (back to front).
#[derive(Debug, Clone)]
pub struct StrokeStore {
    strokes: HashMap<StrokeId, Stroke>,
    order: Vec<StrokeId>,
    index: GridIndex,
}

impl Default for StrokeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StrokeStore {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.ordered().eq(other.ordered())
    }
}

impl StrokeStore {
    pub fn new() -> Self {
        Self::with_cell_size(DEFAULT_CELL_SIZE)
    }

    pub fn with_cell_size(cell_size: f64) -> Self {
        Self {
            strokes: HashMap::new(),
            order: Vec::new(),
            index: GridIndex::new(cell_size),
        }
    }

    /// Build a store from strokes in paint order. Later duplicates of an id replace earlier ones.
    pub fn from_strokes(strokes: impl IntoIterator<Item = Stroke>, cell_size: f64) -> Self {
        let mut store = Self::with_cell_size(cell_size);
        for stroke in strokes {
            store.remove(stroke.id());
            store.add(stroke);
        }
        store
    }

    /// Append a stroke at the front of the paint order.
    pub fn add(&mut self, stroke: Stroke) {
        let index = self.order.len();
        self.insert_at(index, stroke);
    }

    /// Insert a stroke at a paint-order position (clamped to the end).
    pub fn insert_at(&mut self, index: usize, stroke: Stroke) {
        let id = stroke.id();
        if let Some(old) = self.strokes.remove(&id) {
            self.index.remove(id, old.paint_bounds());
            self.order.retain(|&existing| existing != id);
        }
        self.index.insert(id, stroke.paint_bounds());
        self.order.insert(index.min(self.order.len()), id);
        self.strokes.insert(id, stroke);
    }

    /// Remove a stroke, returning it together with the position it occupied.
    pub fn remove(&mut self, id: StrokeId) -> Option<PlacedStroke> {
        let stroke = self.strokes.remove(&id)?;
        self.index.remove(id, stroke.paint_bounds());
        let index = self.order.iter().position(|&existing| existing == id)?;
        self.order.remove(index);
        Some(PlacedStroke { index, stroke })
    }

    /// Translate a stroke in place, keeping the index in sync.
    pub fn translate(&mut self, id: StrokeId, delta: Vec2) -> bool {
        let Some(stroke) = self.strokes.get_mut(&id) else {
            return false;
        };
        self.index.remove(id, stroke.paint_bounds());
        stroke.translate(delta);
        self.index.insert(id, stroke.paint_bounds());
        true
    }

    /// Replace a stroke's content without changing its position.
    pub fn replace(&mut self, stroke: Stroke) -> bool {
        let id = stroke.id();
        let Some(old) = self.strokes.get(&id) else {
            return false;
        };
        self.index.remove(id, old.paint_bounds());
        self.index.insert(id, stroke.paint_bounds());
        self.strokes.insert(id, stroke);
        true
    }

    pub fn get(&self, id: StrokeId) -> Option<&Stroke> {
        self.strokes.get(&id)
    }

    pub fn contains(&self, id: StrokeId) -> bool {
        self.strokes.contains_key(&id)
    }

    /// Strokes in paint order.
    pub fn ordered(&self) -> impl Iterator<Item = &Stroke> {
        self.order.iter().filter_map(|id| self.strokes.get(id))
    }

    pub fn ids(&self) -> &[StrokeId] {
        &self.order
    }

    /// Strokes whose painted bounds intersect `region`, in paint order.
    ///
    /// Only strokes registered in the grid cells covering `region` are examined.
    pub fn query_region(&self, region: Rect) -> Vec<&Stroke> {
        let candidates = self.index.candidates(region);
        if candidates.as_ref().is_some_and(HashSet::is_empty) {
            return Vec::new();
        }
        self.order
            .iter()
            .filter(|id| candidates.as_ref().is_none_or(|c| c.contains(*id)))
            .filter_map(|id| self.strokes.get(id))
            .filter(|stroke| overlaps(stroke.paint_bounds(), region))
            .collect()
    }

    /// Bounds of all strokes.
    pub fn bounds(&self) -> Option<Rect> {
        self.ordered().map(Stroke::paint_bounds).reduce(|a, b| a.union(b))
    }

    /// Remove every stroke, returning them in removal order (front to back).
    pub fn drain(&mut self) -> Vec<PlacedStroke> {
        let ids: Vec<StrokeId> = self.order.iter().rev().copied().collect();
        let removed = ids.into_iter().filter_map(|id| self.remove(id)).collect();
        self.index.clear();
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }
}

/// Closed-interval overlap so zero-area bounds (straight strokes) still match.
fn overlaps(a: Rect, b: Rect) -> bool {
    a.x0 <= b.x1 && b.x0 <= a.x1 && a.y0 <= b.y1 && b.y0 <= a.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{PenType, SerializableColor, StrokePoint};

    fn stroke_at(x: f64, y: f64) -> Stroke {
        Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            vec![StrokePoint::new(x, y, 1.0, 0), StrokePoint::new(x + 10.0, y + 10.0, 1.0, 1)],
        )
    }

    #[test]
    fn test_add_and_remove() {
        let mut store = StrokeStore::new();
        let stroke = stroke_at(0.0, 0.0);
        let id = stroke.id();

        store.add(stroke);
        assert_eq!(store.len(), 1);
        assert!(store.contains(id));

        let removed = store.remove(id).unwrap();
        assert_eq!(removed.index, 0);
        assert!(store.is_empty());
        assert!(store.remove(id).is_none());
    }

    #[test]
    fn test_insert_at_restores_order() {
        let mut store = StrokeStore::new();
        let strokes: Vec<Stroke> = (0..3).map(|i| stroke_at(i as f64 * 20.0, 0.0)).collect();
        for s in &strokes {
            store.add(s.clone());
        }
        let before = store.clone();

        let placed = store.remove(strokes[1].id()).unwrap();
        assert_eq!(placed.index, 1);
        store.insert_at(placed.index, placed.stroke);
        assert_eq!(store, before);
    }

    #[test]
    fn test_query_region_prunes_far_strokes() {
        let mut store = StrokeStore::with_cell_size(64.0);
        let near = stroke_at(10.0, 10.0);
        let far = stroke_at(1000.0, 5000.0);
        let near_id = near.id();
        store.add(near);
        store.add(far);

        let hits = store.query_region(Rect::new(0.0, 0.0, 50.0, 50.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), near_id);
        assert!(store.query_region(Rect::new(300.0, 300.0, 400.0, 400.0)).is_empty());
    }

    #[test]
    fn test_translate_updates_index() {
        let mut store = StrokeStore::with_cell_size(64.0);
        let stroke = stroke_at(0.0, 0.0);
        let id = stroke.id();
        store.add(stroke);

        assert!(store.translate(id, Vec2::new(500.0, 500.0)));
        assert!(store.query_region(Rect::new(0.0, 0.0, 20.0, 20.0)).is_empty());
        assert_eq!(store.query_region(Rect::new(495.0, 495.0, 520.0, 520.0)).len(), 1);
    }

    #[test]
    fn test_drain() {
        let mut store = StrokeStore::new();
        store.add(stroke_at(0.0, 0.0));
        store.add(stroke_at(50.0, 0.0));
        let removed = store.drain();
        assert_eq!(removed.len(), 2);
        assert_eq!(removed[0].index, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unbucketable_strokes_stay_queryable() {
        let mut store = StrokeStore::with_cell_size(64.0);
        let tall = Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            vec![StrokePoint::new(5.0, 0.0, 1.0, 0), StrokePoint::new(5.0, 1.0e15, 1.0, 1)],
        );
        let broken = Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            vec![StrokePoint::new(0.0, 0.0, 1.0, 0), StrokePoint::new(f64::INFINITY, 0.0, 1.0, 1)],
        );
        let (tall_id, broken_id) = (tall.id(), broken.id());
        store.add(tall);
        store.add(broken);
        store.add(stroke_at(1000.0, 1000.0));

        let hits: Vec<_> = store.query_region(Rect::new(0.0, 0.0, 20.0, 20.0)).iter().map(|s| s.id()).collect();
        assert_eq!(hits, vec![tall_id, broken_id]);
        assert_eq!(store.query_region(Rect::new(-1.0e18, -1.0e18, 1.0e18, 1.0e18)).len(), 3);

        assert!(store.remove(tall_id).is_some());
        assert!(store.remove(broken_id).is_some());
        assert!(store.query_region(Rect::new(0.0, 0.0, 20.0, 20.0)).is_empty());
    }
}
