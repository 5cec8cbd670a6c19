//! Snapshot-based undo/redo history.
//!
//! Each settled mutation commits one snapshot of the elements and the
//! selection. Undo and redo move a cursor and hand back the snapshot to show;
//! the document then re-applies it through the regular commit path, which is
//! swallowed by a one-shot suppress flag so replays never record themselves.

use crate::config::MAX_UNDO_HISTORY;
use crate::elements::{Element, ElementId};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

/// Reasons a state cannot be captured as a snapshot.
#[derive(Debug, Error, PartialEq)]
pub enum HistoryError {
    #[error("Element {0} has a non-finite attribute")]
    NonFinite(ElementId),
    #[error("Element id {0} appears more than once")]
    DuplicateId(ElementId),
}

/// A frozen copy of the document state.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub elements: Vec<Element>,
    pub selection: Vec<ElementId>,
}

impl Snapshot {
    /// Deep-copy a state, refusing anything the portable form cannot represent.
    pub fn capture(elements: &[Element], selection: &[ElementId]) -> Result<Self, HistoryError> {
        let mut seen = HashSet::new();
        for element in elements {
            if let Some(id) = element.find_non_finite() {
                return Err(HistoryError::NonFinite(id));
            }
            for id in element.all_ids() {
                if !seen.insert(id) {
                    return Err(HistoryError::DuplicateId(id));
                }
            }
        }
        Ok(Self {
            elements: elements.to_vec(),
            selection: selection.to_vec(),
        })
    }
}

/// Result of a commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new snapshot was appended.
    Recorded,
    /// The commit was a replay of undo/redo and was not recorded.
    Suppressed,
    /// The state could not be captured; history is unchanged.
    Dropped,
}

/// Bounded linear history with a cursor at the visible state.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: VecDeque<Snapshot>,
    index: usize,
    capacity: usize,
    suppress_next: bool,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            index: 0,
            capacity: capacity.max(1),
            suppress_next: false,
        }
    }

    /// Record a state.
    ///
    /// If an undo/redo just happened, the flag is consumed and nothing is
    /// recorded. Otherwise the future is discarded, the snapshot appended and
    /// the oldest entries evicted past capacity.
    pub fn commit(&mut self, elements: &[Element], selection: &[ElementId]) -> CommitOutcome {
        if self.suppress_next {
            self.suppress_next = false;
            return CommitOutcome::Suppressed;
        }

        let snapshot = match Snapshot::capture(elements, selection) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::error!("history commit dropped: {err}");
                return CommitOutcome::Dropped;
            }
        };

        if !self.snapshots.is_empty() {
            self.snapshots.truncate(self.index + 1);
        }
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
        self.index = self.snapshots.len() - 1;
        CommitOutcome::Recorded
    }

    /// Step back one entry. Returns the snapshot to display, or None at the
    /// oldest entry.
    pub fn undo(&mut self) -> Option<Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.suppress_next = true;
        self.index -= 1;
        self.snapshots.get(self.index).cloned()
    }

    /// Step forward one entry. Returns the snapshot to display, or None at the
    /// newest entry.
    pub fn redo(&mut self) -> Option<Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.suppress_next = true;
        self.index += 1;
        self.snapshots.get(self.index).cloned()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0 && !self.snapshots.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.snapshots.len()
    }

    /// The snapshot under the cursor.
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.index)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the next commit will be swallowed as a replay.
    pub fn is_suppressed(&self) -> bool {
        self.suppress_next
    }

    /// Forget everything and start over from a baseline state.
    pub fn reset(&mut self, elements: &[Element], selection: &[ElementId]) -> CommitOutcome {
        self.snapshots.clear();
        self.index = 0;
        self.suppress_next = false;
        self.commit(elements, selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Shape, ShapeKind};
    use kurbo::Point;

    fn rect_at(x: f64) -> Element {
        Element::Shape(Shape::new(ShapeKind::Rectangle, Point::new(x, 0.0), 10.0, 10.0))
    }

    fn xs(snapshot: &Snapshot) -> Vec<f64> {
        snapshot.elements.iter().map(|e| e.base().x).collect()
    }

    #[test]
    fn test_round_trip() {
        let mut history = History::new(50);
        let s0 = vec![rect_at(0.0)];
        let s1 = vec![rect_at(1.0)];
        let s2 = vec![rect_at(2.0)];
        history.commit(&s0, &[]);
        history.commit(&s1, &[]);
        history.commit(&s2, &[]);

        let undone = history.undo().unwrap();
        assert_eq!(undone.elements, s1);
        // The replay of the undone state is not recorded.
        assert_eq!(history.commit(&undone.elements, &[]), CommitOutcome::Suppressed);

        let undone = history.undo().unwrap();
        assert_eq!(undone.elements, s0);
        history.commit(&undone.elements, &[]);

        let redone = history.redo().unwrap();
        assert_eq!(redone.elements, s1);
        history.commit(&redone.elements, &[]);
        let redone = history.redo().unwrap();
        assert_eq!(redone.elements, s2);
        history.commit(&redone.elements, &[]);

        assert!(history.redo().is_none());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_undo_at_start_is_noop() {
        let mut history = History::new(50);
        assert!(history.undo().is_none());
        history.commit(&[rect_at(0.0)], &[]);
        assert!(history.undo().is_none());
        assert!(!history.is_suppressed());
    }

    #[test]
    fn test_commit_after_undo_truncates_future() {
        let mut history = History::new(50);
        history.commit(&[rect_at(0.0)], &[]);
        history.commit(&[rect_at(1.0)], &[]);
        history.commit(&[rect_at(2.0)], &[]);
        let undone = history.undo().unwrap();
        history.commit(&undone.elements, &[]);

        history.commit(&[rect_at(9.0)], &[]);
        assert_eq!(history.len(), 3);
        assert!(!history.can_redo());
        assert_eq!(xs(history.current().unwrap()), vec![9.0]);
    }

    #[test]
    fn test_eviction_bound() {
        let capacity = 5;
        let mut history = History::new(capacity);
        for i in 0..capacity + 2 {
            history.commit(&[rect_at(i as f64)], &[]);
        }
        assert_eq!(history.len(), capacity);

        let mut steps = 0;
        while let Some(snapshot) = history.undo() {
            history.commit(&snapshot.elements, &[]);
            steps += 1;
        }
        assert_eq!(steps, capacity - 1);
        // The oldest survivor is the third commit.
        assert_eq!(xs(history.current().unwrap()), vec![2.0]);
    }

    #[test]
    fn test_capture_failure_is_dropped() {
        let mut history = History::new(50);
        history.commit(&[rect_at(0.0)], &[]);

        let mut bad = rect_at(1.0);
        bad.base_mut().x = f64::NAN;
        assert_eq!(history.commit(&[bad], &[]), CommitOutcome::Dropped);
        assert_eq!(history.len(), 1);
        assert_eq!(history.index(), 0);

        let dup = rect_at(2.0);
        assert_eq!(
            history.commit(&[dup.clone(), dup], &[]),
            CommitOutcome::Dropped
        );
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_selection_travels_with_snapshot() {
        let mut history = History::new(50);
        let a = rect_at(0.0);
        let id = a.id();
        history.commit(&[a.clone()], &[]);
        history.commit(&[a], &[id]);
        let undone = history.undo().unwrap();
        assert!(undone.selection.is_empty());
        history.commit(&undone.elements, &undone.selection);
        let redone = history.redo().unwrap();
        assert_eq!(redone.selection, vec![id]);
    }
}
