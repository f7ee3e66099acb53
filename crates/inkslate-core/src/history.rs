//! Undo/redo history of stroke operations with batched commits.
//!
//! Every operation stored here has already been applied to the store by the handler that
//! produced it. Undo reverts a group, redo applies it again. Each operation carries the
//! stroke data needed to invert it exactly, so an undo followed by a redo restores a
//! content-equal, id-stable and order-stable store.

use crate::geometry::union_rects;
use crate::store::{PlacedStroke, StrokeStore};
use crate::stroke::{Stroke, StrokeId};
use kurbo::{Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum number of undo groups to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// A reversible mutation of the stroke store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Strokes appended to the paint order.
    AddStrokes(Vec<Stroke>),
    /// Strokes removed, in removal order, with the position each one occupied.
    DeleteStrokes(Vec<PlacedStroke>),
    /// Strokes translated by `delta`; `before` holds their content prior to the move.
    MoveStrokes { delta: Vec2, before: Vec<Stroke> },
}

impl Operation {
    /// Ids of the strokes this operation touches.
    pub fn ids(&self) -> Vec<StrokeId> {
        match self {
            Operation::AddStrokes(strokes) => strokes.iter().map(Stroke::id).collect(),
            Operation::DeleteStrokes(placed) => placed.iter().map(|p| p.stroke.id()).collect(),
            Operation::MoveStrokes { before, .. } => before.iter().map(Stroke::id).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Operation::AddStrokes(strokes) => strokes.is_empty(),
            Operation::DeleteStrokes(placed) => placed.is_empty(),
            Operation::MoveStrokes { before, .. } => before.is_empty(),
        }
    }

    /// Merge `other` into `self` when both are of the same batchable kind.
    fn absorb(&mut self, other: Operation) -> Option<Operation> {
        match (self, other) {
            (Operation::AddStrokes(mine), Operation::AddStrokes(theirs)) => {
                mine.extend(theirs);
                None
            }
            (Operation::DeleteStrokes(mine), Operation::DeleteStrokes(theirs)) => {
                mine.extend(theirs);
                None
            }
            (_, other) => Some(other),
        }
    }

    fn apply(&self, store: &mut StrokeStore, effect: &mut Applied) {
        match self {
            Operation::AddStrokes(strokes) => {
                for stroke in strokes {
                    store.add(stroke.clone());
                    effect.touch(stroke.paint_bounds());
                    effect.delta.upsert(stroke.clone());
                }
            }
            Operation::DeleteStrokes(placed) => {
                for p in placed {
                    if store.remove(p.stroke.id()).is_some() {
                        effect.touch(p.stroke.paint_bounds());
                        effect.delta.delete(p.stroke.id());
                    }
                }
            }
            Operation::MoveStrokes { delta, before } => {
                for stroke in before {
                    let moved = translated(stroke, *delta);
                    if store.replace(moved.clone()) {
                        effect.touch(stroke.paint_bounds());
                        effect.touch(moved.paint_bounds());
                        effect.shift(stroke.id(), *delta);
                        effect.delta.upsert(moved);
                    }
                }
            }
        }
    }

    fn revert(&self, store: &mut StrokeStore, effect: &mut Applied) {
        match self {
            Operation::AddStrokes(strokes) => {
                for stroke in strokes.iter().rev() {
                    if store.remove(stroke.id()).is_some() {
                        effect.touch(stroke.paint_bounds());
                        effect.delta.delete(stroke.id());
                    }
                }
            }
            Operation::DeleteStrokes(placed) => {
                for p in placed.iter().rev() {
                    store.insert_at(p.index, p.stroke.clone());
                    effect.touch(p.stroke.paint_bounds());
                    effect.delta.upsert(p.stroke.clone());
                }
            }
            Operation::MoveStrokes { delta, before } => {
                for stroke in before.iter().rev() {
                    if store.replace(stroke.clone()) {
                        effect.touch(translated(stroke, *delta).paint_bounds());
                        effect.touch(stroke.paint_bounds());
                        effect.shift(stroke.id(), -*delta);
                        effect.delta.upsert(stroke.clone());
                    }
                }
            }
        }
    }

    /// Persistence delta of this operation's forward effect.
    fn forward_delta(&self, delta: &mut StrokeDelta) {
        match self {
            Operation::AddStrokes(strokes) => {
                for stroke in strokes {
                    delta.upsert(stroke.clone());
                }
            }
            Operation::DeleteStrokes(placed) => {
                for p in placed {
                    delta.delete(p.stroke.id());
                }
            }
            Operation::MoveStrokes { delta: offset, before } => {
                for stroke in before {
                    delta.upsert(translated(stroke, *offset));
                }
            }
        }
    }
}

/// Apply a move to a copy of `stroke`. Shared by the select handler and redo so both
/// produce bit-identical points.
pub fn translated(stroke: &Stroke, delta: Vec2) -> Stroke {
    let mut moved = stroke.clone();
    moved.translate(delta);
    moved
}

/// The atomic undo unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationGroup {
    pub operations: Vec<Operation>,
}

impl OperationGroup {
    pub fn ids(&self) -> Vec<StrokeId> {
        self.operations.iter().flat_map(Operation::ids).collect()
    }

    fn delta(&self) -> StrokeDelta {
        let mut delta = StrokeDelta::default();
        for op in &self.operations {
            op.forward_delta(&mut delta);
        }
        delta
    }
}

/// Net change to persist: strokes to write and ids to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrokeDelta {
    pub upserted: Vec<Stroke>,
    pub deleted: Vec<StrokeId>,
}

impl StrokeDelta {
    pub fn upsert(&mut self, stroke: Stroke) {
        let id = stroke.id();
        self.deleted.retain(|&d| d != id);
        self.upserted.retain(|s| s.id() != id);
        self.upserted.push(stroke);
    }

    pub fn delete(&mut self, id: StrokeId) {
        self.upserted.retain(|s| s.id() != id);
        if !self.deleted.contains(&id) {
            self.deleted.push(id);
        }
    }

    pub fn merge(&mut self, other: StrokeDelta) {
        for id in other.deleted {
            self.delete(id);
        }
        for stroke in other.upserted {
            self.upsert(stroke);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.upserted.is_empty() && self.deleted.is_empty()
    }
}

/// Result of undoing or redoing a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Applied {
    /// Page-space region that needs repainting.
    pub dirty: Option<Rect>,
    pub delta: StrokeDelta,
    /// Net translation of each stroke moved back or forth.
    pub shifted: BTreeMap<StrokeId, Vec2>,
}

impl Applied {
    fn touch(&mut self, rect: Rect) {
        self.dirty = union_rects(self.dirty, Some(rect));
    }

    fn shift(&mut self, id: StrokeId, by: Vec2) {
        *self.shifted.entry(id).or_default() += by;
    }
}

/// Already-applied operations produced by one handler call, with the page region they touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edit {
    pub operations: Vec<Operation>,
    pub dirty: Option<Rect>,
}

impl Edit {
    pub fn is_empty(&self) -> bool {
        self.operations.iter().all(Operation::is_empty)
    }
}

/// Linear undo/redo stacks plus the batch of operations awaiting the debounce flush.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<OperationGroup>,
    redo_stack: Vec<OperationGroup>,
    pending: Vec<Operation>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            pending: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Queue an already-applied operation for the next batched commit.
    pub fn push_pending(&mut self, op: Operation) {
        if op.is_empty() {
            return;
        }
        let leftover = match self.pending.last_mut() {
            Some(last) => last.absorb(op),
            None => Some(op),
        };
        if let Some(op) = leftover {
            self.pending.push(op);
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Commit the pending batch as one group. Returns `None` when nothing was pending.
    pub fn flush_pending(&mut self) -> Option<StrokeDelta> {
        if self.pending.is_empty() {
            return None;
        }
        let group = OperationGroup {
            operations: std::mem::take(&mut self.pending),
        };
        let delta = group.delta();
        log::info!("Committing history group touching {} strokes", group.ids().len());
        self.push_group(group);
        Some(delta)
    }

    /// Push one atomic group of already-applied operations, flushing the pending batch first.
    pub fn record_group(&mut self, operations: Vec<Operation>) -> StrokeDelta {
        let mut delta = self.flush_pending().unwrap_or_default();
        let operations: Vec<Operation> = operations.into_iter().filter(|op| !op.is_empty()).collect();
        if operations.is_empty() {
            return delta;
        }
        let group = OperationGroup { operations };
        delta.merge(group.delta());
        self.push_group(group);
        delta
    }

    fn push_group(&mut self, group: OperationGroup) {
        self.undo_stack.push(group);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
    }

    /// Revert the most recent group. Returns `None` when there is nothing to undo.
    pub fn undo(&mut self, store: &mut StrokeStore) -> Option<Applied> {
        let mut effect = Applied::default();
        if let Some(delta) = self.flush_pending() {
            effect.delta.merge(delta);
        }
        match self.undo_stack.pop() {
            Some(group) => {
                for op in group.operations.iter().rev() {
                    op.revert(store, &mut effect);
                }
                self.redo_stack.push(group);
                Some(effect)
            }
            None => None,
        }
    }

    /// Re-apply the most recently undone group. Returns `None` when there is nothing to redo
    /// and nothing was pending.
    pub fn redo(&mut self, store: &mut StrokeStore) -> Option<Applied> {
        let mut effect = Applied::default();
        if let Some(delta) = self.flush_pending() {
            effect.delta.merge(delta);
        }
        match self.redo_stack.pop() {
            Some(group) => {
                for op in &group.operations {
                    op.apply(store, &mut effect);
                }
                self.undo_stack.push(group);
                Some(effect)
            }
            // Flushing a pending batch discards the redo tail; the flushed delta still
            // has to reach persistence
            None if !effect.delta.is_empty() => Some(effect),
            None => None,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty() || self.has_pending()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// The most recently committed group.
    pub fn last_group(&self) -> Option<&OperationGroup> {
        self.undo_stack.last()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stroke::{PenType, SerializableColor, StrokePoint};

    fn stroke_at(x: f64) -> Stroke {
        Stroke::new(
            PenType::Ballpen,
            SerializableColor::black(),
            2.0,
            vec![StrokePoint::new(x, 0.0, 1.0, 0), StrokePoint::new(x, 40.0, 1.0, 1)],
        )
    }

    fn add(store: &mut StrokeStore, history: &mut History, stroke: Stroke) {
        store.add(stroke.clone());
        history.push_pending(Operation::AddStrokes(vec![stroke]));
    }

    #[test]
    fn test_pending_adds_collapse_into_one_group() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        for i in 0..5 {
            add(&mut store, &mut history, stroke_at(i as f64 * 10.0));
        }
        let delta = history.flush_pending().unwrap();
        assert_eq!(delta.upserted.len(), 5);
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.last_group().unwrap().operations.len(), 1);
    }

    #[test]
    fn test_empty_flush_records_nothing() {
        let mut history = History::default();
        assert!(history.flush_pending().is_none());
        assert_eq!(history.undo_len(), 0);
    }

    #[test]
    fn test_undo_redo_roundtrip() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        add(&mut store, &mut history, stroke_at(0.0));
        add(&mut store, &mut history, stroke_at(10.0));
        history.flush_pending();
        let after = store.clone();

        let undone = history.undo(&mut store).unwrap();
        assert!(store.is_empty());
        assert_eq!(undone.delta.deleted.len(), 2);
        assert!(undone.dirty.is_some());

        history.redo(&mut store).unwrap();
        assert_eq!(store, after);
    }

    #[test]
    fn test_undo_delete_restores_order() {
        let mut store = StrokeStore::new();
        let strokes: Vec<Stroke> = (0..4).map(|i| stroke_at(i as f64 * 10.0)).collect();
        for s in &strokes {
            store.add(s.clone());
        }
        let before = store.clone();
        let mut history = History::default();

        let removed: Vec<PlacedStroke> = [strokes[2].id(), strokes[0].id()]
            .into_iter()
            .filter_map(|id| store.remove(id))
            .collect();
        history.record_group(vec![Operation::DeleteStrokes(removed)]);
        let after = store.clone();

        history.undo(&mut store);
        assert_eq!(store, before);
        history.redo(&mut store);
        assert_eq!(store, after);
    }

    #[test]
    fn test_move_roundtrip_is_exact() {
        let mut store = StrokeStore::new();
        let stroke = stroke_at(0.1);
        store.add(stroke.clone());
        let before = store.clone();

        let delta = Vec2::new(0.3, 0.7);
        store.replace(translated(&stroke, delta));
        let mut history = History::default();
        history.record_group(vec![Operation::MoveStrokes {
            delta,
            before: vec![stroke],
        }]);
        let after = store.clone();

        history.undo(&mut store);
        assert_eq!(store, before);
        history.redo(&mut store);
        assert_eq!(store, after);
    }

    #[test]
    fn test_record_group_clears_redo() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        add(&mut store, &mut history, stroke_at(0.0));
        history.flush_pending();
        history.undo(&mut store);
        assert!(history.can_redo());

        add(&mut store, &mut history, stroke_at(5.0));
        history.flush_pending();
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_flushes_pending_first() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        add(&mut store, &mut history, stroke_at(0.0));

        assert!(history.can_undo());
        history.undo(&mut store).unwrap();
        assert!(store.is_empty());
        assert_eq!(history.redo_len(), 1);
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        assert!(history.undo(&mut store).is_none());
        assert!(history.redo(&mut store).is_none());
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut store = StrokeStore::new();
        let mut history = History::new(2);
        for i in 0..3 {
            add(&mut store, &mut history, stroke_at(i as f64));
            history.flush_pending();
        }
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_mixed_batch_keeps_chronology() {
        let mut store = StrokeStore::new();
        let mut history = History::default();
        let stroke = stroke_at(0.0);
        add(&mut store, &mut history, stroke.clone());
        let placed = store.remove(stroke.id()).unwrap();
        history.push_pending(Operation::DeleteStrokes(vec![placed]));

        let delta = history.flush_pending().unwrap();
        assert!(delta.upserted.is_empty());
        assert_eq!(delta.deleted, vec![stroke.id()]);

        history.undo(&mut store);
        assert!(store.is_empty());
        history.redo(&mut store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delta_merge() {
        let stroke = stroke_at(0.0);
        let mut delta = StrokeDelta::default();
        delta.upsert(stroke.clone());
        delta.delete(stroke.id());
        assert!(delta.upserted.is_empty());
        delta.upsert(stroke.clone());
        assert!(delta.deleted.is_empty());
        assert_eq!(delta.upserted.len(), 1);
    }
}
