//! Linear snapshot-based undo/redo history.
//!
//! Entries are whole copies of the tracked state. Index 0 holds the initial
//! snapshot and is never removed. Pushing after an undo discards the redo
//! branch.

use tracing::debug;

/// Ordered snapshots plus the index of the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct History<T> {
    entries: Vec<T>,
    index: usize,
}

impl<T: Clone> History<T> {
    /// Creates a history whose only entry is `initial`.
    ///
    /// # Example
    /// ```
    /// use engine::History;
    ///
    /// let mut history = History::new(0);
    /// history.push(1);
    /// assert_eq!(history.undo(), &0);
    /// assert_eq!(history.redo(), &1);
    /// ```
    pub fn new(initial: T) -> Self {
        Self {
            entries: vec![initial],
            index: 0,
        }
    }

    /// Rebuilds a history from persisted entries.
    ///
    /// Returns `None` when `entries` is empty. `index` is clamped to the last
    /// entry.
    pub fn from_entries(entries: Vec<T>, index: usize) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let index = index.min(entries.len() - 1);
        Some(Self { entries, index })
    }

    /// Appends `snapshot` after the current entry, dropping any redo branch.
    pub fn push(&mut self, snapshot: T) {
        let discarded = self.entries.len() - (self.index + 1);
        self.entries.truncate(self.index + 1);
        self.entries.push(snapshot);
        self.index += 1;
        debug!(
            index = self.index,
            discarded_redo = discarded,
            "history entry pushed"
        );
    }

    /// Steps back one entry and returns the snapshot now current.
    ///
    /// At index 0 this is a no-op returning the initial snapshot.
    pub fn undo(&mut self) -> &T {
        if self.index > 0 {
            self.index -= 1;
        }
        &self.entries[self.index]
    }

    /// Steps forward one entry and returns the snapshot now current.
    pub fn redo(&mut self) -> &T {
        if self.index + 1 < self.entries.len() {
            self.index += 1;
        }
        &self.entries[self.index]
    }

    pub fn current(&self) -> &T {
        &self.entries[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0
    }

    pub fn can_redo(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    /// Drops every entry and restarts from `initial`.
    pub fn reset(&mut self, initial: T) {
        self.entries.clear();
        self.entries.push(initial);
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::History;
    use crate::range::Range;

    fn cuts(bounds: &[(f64, f64)]) -> Vec<Range> {
        bounds
            .iter()
            .map(|(start, end)| Range {
                start: *start,
                end: *end,
            })
            .collect()
    }

    #[test]
    fn undo_after_push_restores_prior_snapshot() {
        let mut history = History::new(Vec::<Range>::new());
        history.push(cuts(&[(1.0, 2.0)]));
        history.push(cuts(&[(1.0, 2.0), (4.0, 5.0)]));

        assert_eq!(history.undo(), &cuts(&[(1.0, 2.0)]));
        assert_eq!(history.redo(), &cuts(&[(1.0, 2.0), (4.0, 5.0)]));
    }

    #[test]
    fn undo_at_initial_entry_is_noop() {
        let mut history = History::new(Vec::<Range>::new());
        assert!(!history.can_undo());
        assert!(history.undo().is_empty());
        assert_eq!(history.index(), 0);
    }

    #[test]
    fn redo_at_last_entry_is_noop() {
        let mut history = History::new(0);
        history.push(1);
        assert_eq!(history.redo(), &1);
        assert_eq!(history.index(), 1);
        assert!(!history.can_redo());
    }

    #[test]
    fn push_after_undo_discards_redo_branch() {
        let mut history = History::new(0);
        history.push(1);
        history.push(2);
        history.undo();
        history.undo();
        history.push(3);

        assert_eq!(history.entries(), &[0, 3]);
        assert_eq!(history.redo(), &3);
        assert_eq!(history.undo(), &0);
    }

    #[test]
    fn initial_entry_survives_any_sequence() {
        let mut history = History::new(10);
        for value in 0..5 {
            history.push(value);
            history.undo();
        }
        assert_eq!(history.entries()[0], 10);
        assert_eq!(history.entries().len(), 2);
    }

    #[test]
    fn from_entries_clamps_index_and_rejects_empty() {
        assert!(History::<u8>::from_entries(Vec::new(), 0).is_none());
        let history = History::from_entries(vec![1, 2, 3], 9).expect("non-empty history");
        assert_eq!(history.current(), &3);
    }
}
