//! Lasso selection and the operations on a selection.

use crate::geometry::{bounds_of, close_polygon, polygon_contains, union_rects};
use crate::history::{Edit, Operation, translated};
use crate::page::Page;
use crate::store::StrokeStore;
use crate::stroke::{Stroke, StrokeId};
use kurbo::{Point, Rect, Vec2};
use std::collections::BTreeSet;

/// Padding around the lasso outline when computing its repaint region.
const BOUNDARY_PAD: f64 = 4.0;

/// The current lasso and the strokes it captured. Boundary points are in page space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    pub boundary: Vec<Point>,
    pub selected: BTreeSet<StrokeId>,
}

impl SelectionState {
    /// Build a selection from a lasso over `store`.
    ///
    /// A stroke is selected when any of its points lies inside the closed lasso under the
    /// even-odd rule. Only strokes overlapping the lasso bounds are examined.
    pub fn from_lasso(store: &StrokeStore, lasso: &[Point]) -> Self {
        let boundary = close_polygon(lasso);
        let mut selected = BTreeSet::new();

        if boundary.len() > 3 {
            if let Some(region) = bounds_of(boundary.iter().copied()) {
                for stroke in store.query_region(region) {
                    if stroke.positions().any(|p| polygon_contains(&boundary, p)) {
                        selected.insert(stroke.id());
                    }
                }
            }
        }

        Self { boundary, selected }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Region covered by the drawn lasso outline.
    pub fn boundary_bounds(&self) -> Option<Rect> {
        bounds_of(self.boundary.iter().copied()).map(|r| r.inflate(BOUNDARY_PAD, BOUNDARY_PAD))
    }

    /// Region covered by the lasso and every selected stroke.
    pub fn dirty_bounds(&self, store: &StrokeStore) -> Option<Rect> {
        self.selected
            .iter()
            .filter_map(|id| store.get(*id))
            .map(Stroke::paint_bounds)
            .fold(self.boundary_bounds(), |acc, r| union_rects(acc, Some(r)))
    }

    pub(crate) fn translate(&mut self, delta: Vec2) {
        for point in &mut self.boundary {
            *point += delta;
        }
    }
}

/// Replace the page selection with the strokes captured by `lasso` (page space).
///
/// Returns the region to repaint: the old lasso, the new lasso and everything highlighted.
pub fn select(page: &mut Page, lasso: &[Point]) -> Option<Rect> {
    let previous = page.selection.take().and_then(|s| s.dirty_bounds(&page.strokes));
    let selection = SelectionState::from_lasso(&page.strokes, lasso);
    log::debug!(
        "Lasso with {} points selected {} strokes",
        lasso.len(),
        selection.selected.len()
    );
    let current = selection.dirty_bounds(&page.strokes);
    page.selection = Some(selection);
    union_rects(previous, current)
}

/// Translate the selected strokes and the lasso by `delta`.
///
/// The returned edit holds one `MoveStrokes` operation, empty when nothing is selected.
pub fn move_selection(page: &mut Page, delta: Vec2) -> Edit {
    let Some(selection) = page.selection.as_mut() else {
        return Edit::default();
    };
    if selection.is_empty() || delta == Vec2::ZERO {
        return Edit::default();
    }

    let before_dirty = selection.dirty_bounds(&page.strokes);
    let before: Vec<Stroke> = ordered_selection(&page.strokes, &selection.selected)
        .into_iter()
        .cloned()
        .collect();
    for stroke in &before {
        page.strokes.replace(translated(stroke, delta));
    }
    selection.translate(delta);
    let after_dirty = selection.dirty_bounds(&page.strokes);

    Edit {
        operations: vec![Operation::MoveStrokes { delta, before }],
        dirty: union_rects(before_dirty, after_dirty),
    }
}

/// Delete the selected strokes and clear the selection.
pub fn cut_selection(page: &mut Page) -> Edit {
    let Some(selection) = page.selection.take() else {
        return Edit::default();
    };
    let dirty = selection.dirty_bounds(&page.strokes);

    // Remove front to back so each recorded index is valid at its removal time
    let ids: Vec<StrokeId> = ordered_selection(&page.strokes, &selection.selected)
        .into_iter()
        .rev()
        .map(Stroke::id)
        .collect();
    let removed: Vec<_> = ids.into_iter().filter_map(|id| page.strokes.remove(id)).collect();

    Edit {
        operations: vec![Operation::DeleteStrokes(removed)],
        dirty,
    }
}

/// Drop the selection without touching strokes.
pub fn commit_selection(page: &mut Page) -> Option<Rect> {
    let selection = page.selection.take()?;
    selection.dirty_bounds(&page.strokes)
}

/// Selected strokes in paint order.
fn ordered_selection<'a>(store: &'a StrokeStore, selected: &BTreeSet<StrokeId>) -> Vec<&'a Stroke> {
    store
        .ordered()
        .filter(|stroke| selected.contains(&stroke.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{PenType, SerializableColor, StrokePoint};

    fn line(points: &[(f64, f64)]) -> Stroke {
        Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            points.iter().map(|&(x, y)| StrokePoint::new(x, y, 1.0, 0)).collect(),
        )
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_lasso_selects_only_enclosed_strokes() {
        let mut page = Page::new("p");
        let inside = line(&[(100.0, 100.0), (150.0, 150.0)]);
        let outside = line(&[(300.0, 300.0), (350.0, 350.0)]);
        let inside_id = inside.id();
        page.strokes.add(inside);
        page.strokes.add(outside);

        let dirty = select(&mut page, &square(50.0, 50.0, 200.0, 200.0));
        let selection = page.selection.as_ref().unwrap();
        assert_eq!(selection.selected.len(), 1);
        assert!(selection.selected.contains(&inside_id));
        assert!(dirty.is_some());
    }

    #[test]
    fn test_partial_overlap_is_selected() {
        let mut page = Page::new("p");
        let crossing = line(&[(100.0, 100.0), (400.0, 100.0)]);
        page.strokes.add(crossing);
        select(&mut page, &square(50.0, 50.0, 200.0, 200.0));
        assert_eq!(page.selection.unwrap().selected.len(), 1);
    }

    #[test]
    fn test_degenerate_lasso_selects_nothing() {
        let mut page = Page::new("p");
        page.strokes.add(line(&[(10.0, 10.0), (20.0, 20.0)]));
        select(&mut page, &[Point::new(0.0, 0.0), Point::new(100.0, 100.0)]);
        assert!(page.selection.unwrap().is_empty());
    }

    #[test]
    fn test_new_lasso_replaces_selection() {
        let mut page = Page::new("p");
        let a = line(&[(10.0, 10.0), (20.0, 20.0)]);
        let b = line(&[(300.0, 300.0), (310.0, 310.0)]);
        let b_id = b.id();
        page.strokes.add(a);
        page.strokes.add(b);

        select(&mut page, &square(0.0, 0.0, 50.0, 50.0));
        select(&mut page, &square(290.0, 290.0, 320.0, 320.0));
        let selected = &page.selection.as_ref().unwrap().selected;
        assert_eq!(selected.len(), 1);
        assert!(selected.contains(&b_id));
    }

    #[test]
    fn test_move_selection_translates_strokes_and_boundary() {
        let mut page = Page::new("p");
        let stroke = line(&[(10.0, 10.0), (20.0, 20.0)]);
        let id = stroke.id();
        page.strokes.add(stroke);
        select(&mut page, &square(0.0, 0.0, 50.0, 50.0));

        let edit = move_selection(&mut page, Vec2::new(100.0, 0.0));
        assert_eq!(edit.operations.len(), 1);
        assert_eq!(page.strokes.get(id).unwrap().points[0].x, 110.0);
        assert_eq!(page.selection.as_ref().unwrap().boundary[0], Point::new(100.0, 0.0));
        assert!(edit.dirty.unwrap().contains(Point::new(15.0, 15.0)));
    }

    #[test]
    fn test_cut_selection_removes_strokes() {
        let mut page = Page::new("p");
        page.strokes.add(line(&[(10.0, 10.0), (20.0, 20.0)]));
        page.strokes.add(line(&[(30.0, 30.0), (40.0, 40.0)]));
        page.strokes.add(line(&[(500.0, 500.0), (510.0, 510.0)]));
        select(&mut page, &square(0.0, 0.0, 50.0, 50.0));

        let edit = cut_selection(&mut page);
        assert_eq!(page.strokes.len(), 1);
        assert!(page.selection.is_none());
        match &edit.operations[0] {
            Operation::DeleteStrokes(placed) => assert_eq!(placed.len(), 2),
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn test_operations_without_selection_are_empty() {
        let mut page = Page::new("p");
        assert!(move_selection(&mut page, Vec2::new(1.0, 1.0)).is_empty());
        assert!(cut_selection(&mut page).is_empty());
        assert!(commit_selection(&mut page).is_none());
    }
}
