//! Undo/redo snapshots
//!
//! A [`Snapshot`] captures the entire document set. [`History`] keeps the
//! current snapshot plus two bounded stacks around it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Canvas pan and zoom
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    /// Zoom factor
    pub scale: f64,
    /// Horizontal pan
    pub dx: f64,
    /// Vertical pan
    pub dy: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            dx: 0.0,
            dy: 0.0,
        }
    }
}

/// Visible canvas rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewArea {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Visible width
    pub width: f64,
    /// Visible height
    pub height: f64,
}

/// View state reapplied on restore
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewState {
    /// Zoom and pan
    pub transform: ViewTransform,
    /// Visible scene rectangle
    pub area: ViewArea,
}

/// Immutable capture of the whole document set
///
/// Equality is structural and compares every tab's blob.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Main document, if any
    pub main_tree_name: Option<String>,
    /// Tab shown when the snapshot was taken
    pub active_tab_name: Option<String>,
    /// View to reapply on restore
    pub view: ViewState,
    /// Scene blob per document, in tab order
    pub tabs: IndexMap<String, Vec<u8>>,
}

/// Undo and redo stacks around the current snapshot
///
/// # Invariants
/// - No two adjacent undo entries are equal
/// - The undo stack never holds more than `limit` entries
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    current: Option<Snapshot>,
    limit: usize,
}

impl History {
    /// Empty history keeping at most `limit` undo entries
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            current: None,
            limit: limit.max(1),
        }
    }

    /// Record a new current state
    ///
    /// Returns `false` when `snapshot` equals the current one, in which case
    /// nothing changes. Otherwise the redo stack is cleared.
    pub fn push(&mut self, snapshot: Snapshot) -> bool {
        if self.current.as_ref() == Some(&snapshot) {
            return false;
        }
        if let Some(previous) = self.current.replace(snapshot) {
            if self.undo.back() != Some(&previous) {
                self.undo.push_back(previous);
                while self.undo.len() > self.limit {
                    self.undo.pop_front();
                }
            }
        }
        self.redo.clear();
        true
    }

    /// Snapshot that [`Self::undo`] would make current
    #[must_use]
    pub fn undo_target(&self) -> Option<&Snapshot> {
        self.undo.back()
    }

    /// Snapshot that [`Self::redo`] would make current
    #[must_use]
    pub fn redo_target(&self) -> Option<&Snapshot> {
        self.redo.back()
    }

    /// Step back; returns the new current snapshot
    pub fn undo(&mut self) -> Option<&Snapshot> {
        let target = self.undo.pop_back()?;
        if let Some(current) = self.current.replace(target) {
            self.redo.push_back(current);
        }
        self.current.as_ref()
    }

    /// Step forward; returns the new current snapshot
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let target = self.redo.pop_back()?;
        if let Some(current) = self.current.replace(target) {
            self.undo.push_back(current);
        }
        self.current.as_ref()
    }

    /// Drop both stacks and make `snapshot` the only state
    pub fn reset_to(&mut self, snapshot: Snapshot) {
        self.undo.clear();
        self.redo.clear();
        self.current = Some(snapshot);
    }

    /// State shown now
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    /// Whether an older state exists
    #[inline]
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether a newer state exists
    #[inline]
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Number of older states
    #[inline]
    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    /// Number of newer states
    #[inline]
    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// Maximum number of older states kept
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tag: u8) -> Snapshot {
        let mut snapshot = Snapshot {
            main_tree_name: Some("Main".into()),
            active_tab_name: Some("Main".into()),
            ..Snapshot::default()
        };
        snapshot.tabs.insert("Main".into(), vec![tag]);
        snapshot
    }

    #[test]
    fn identical_pushes_are_discarded() {
        let mut history = History::new(10);
        assert!(history.push(snapshot(0)));
        assert!(history.push(snapshot(1)));
        assert!(!history.push(snapshot(1)));
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn undo_redo_walk_the_stacks() {
        let mut history = History::new(10);
        for tag in 0..3 {
            history.push(snapshot(tag));
        }
        assert_eq!(history.undo(), Some(&snapshot(1)));
        assert_eq!(history.undo(), Some(&snapshot(0)));
        assert_eq!(history.undo(), None);
        assert_eq!(history.current(), Some(&snapshot(0)));
        assert_eq!(history.redo(), Some(&snapshot(1)));
        assert_eq!(history.redo_len(), 1);

        // a new push forks the timeline
        history.push(snapshot(9));
        assert!(!history.can_redo());
        assert_eq!(history.undo_target(), Some(&snapshot(1)));
    }

    #[test]
    fn push_after_undo_reuses_current() {
        let mut history = History::new(10);
        history.push(snapshot(0));
        history.push(snapshot(1));
        history.undo();
        history.push(snapshot(1));
        assert_eq!(history.undo_len(), 1);
        history.push(snapshot(0));
        history.push(snapshot(1));
        assert_eq!(history.undo_len(), 3);
    }

    #[test]
    fn depth_is_bounded() {
        let mut history = History::new(2);
        for tag in 0..5 {
            history.push(snapshot(tag));
        }
        assert_eq!(history.undo_len(), 2);
        assert_eq!(history.undo(), Some(&snapshot(3)));
        assert_eq!(history.undo(), Some(&snapshot(2)));
        assert!(!history.can_undo());
    }

    #[test]
    fn reset_reseeds() {
        let mut history = History::new(5);
        history.push(snapshot(0));
        history.push(snapshot(1));
        history.reset_to(snapshot(2));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.current(), Some(&snapshot(2)));
    }
}
