//! Undo/redo history made of full-surface snapshots.
//!
//! Snapshot `k` holds the surface *after* stroke `k + 1`. The blank surface before the first
//! stroke is never stored; undoing the first stroke clears the surface instead.

/// What the surface has to be reset to after moving through the history.
#[derive(Debug, PartialEq, Eq)]
pub enum Restore<'a, T> {
    Blank,
    Snapshot(&'a T),
}

#[derive(Debug)]
pub struct History<T> {
    snapshots: Vec<T>,
    /// Number of committed strokes currently visible.
    cursor: usize,
}

impl<T> Default for History<T> {
    fn default() -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: 0,
        }
    }
}

impl<T> History<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Records the surface state after a completed stroke, discarding any redoable future.
    pub fn commit(&mut self, snapshot: T) {
        self.snapshots.truncate(self.cursor);
        self.snapshots.push(snapshot);
        self.cursor += 1;
    }

    /// Steps back one stroke. Returns `None` if there is nothing to undo.
    pub fn undo(&mut self) -> Option<Restore<'_, T>> {
        match self.cursor {
            0 => None,
            1 => {
                self.cursor = 0;
                Some(Restore::Blank)
            }
            n => {
                self.cursor = n - 1;
                Some(Restore::Snapshot(&self.snapshots[n - 2]))
            }
        }
    }

    /// Steps forward one stroke. Returns `None` if there is nothing to redo.
    pub fn redo(&mut self) -> Option<&T> {
        let snapshot = self.snapshots.get(self.cursor)?;
        self.cursor += 1;
        Some(snapshot)
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_advances_cursor() {
        let mut h = History::new();
        assert_eq!((h.cursor(), h.len()), (0, 0));
        h.commit('a');
        h.commit('b');
        assert_eq!((h.cursor(), h.len()), (2, 2));
    }

    #[test]
    fn undo_looks_one_slot_back() {
        let mut h = History::new();
        h.commit('a');
        h.commit('b');
        h.commit('c');
        assert_eq!(h.undo(), Some(Restore::Snapshot(&'b')));
        assert_eq!(h.undo(), Some(Restore::Snapshot(&'a')));
        assert_eq!(h.undo(), Some(Restore::Blank));
        assert_eq!(h.undo(), None);
        assert_eq!(h.cursor(), 0);
        assert_eq!(h.len(), 3);
    }

    #[test]
    fn redo_replays_forward() {
        let mut h = History::new();
        h.commit('a');
        h.commit('b');
        assert_eq!(h.redo(), None);
        h.undo();
        h.undo();
        assert_eq!(h.redo(), Some(&'a'));
        assert_eq!(h.redo(), Some(&'b'));
        assert_eq!(h.redo(), None);
        assert_eq!(h.cursor(), 2);
    }

    #[test]
    fn commit_after_undo_truncates_future() {
        let mut h = History::new();
        h.commit('a');
        h.commit('b');
        h.commit('c');
        h.undo();
        h.undo();
        h.commit('x');
        assert_eq!((h.cursor(), h.len()), (2, 2));
        assert_eq!(h.redo(), None);
        assert_eq!(h.undo(), Some(Restore::Snapshot(&'a')));
        assert_eq!(h.redo(), Some(&'x'));
    }

    #[test]
    fn clear_empties_everything() {
        let mut h = History::new();
        for c in "abcdef".chars() {
            h.commit(c);
        }
        h.undo();
        h.clear();
        assert_eq!((h.cursor(), h.len()), (0, 0));
        assert_eq!(h.undo(), None);
        assert_eq!(h.redo(), None);
    }
}
