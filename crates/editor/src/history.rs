use serde::{Deserialize, Serialize};

use crate::{EditorError, Result};

/// Whole-document content captured at one point of edit history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditSnapshot(String);

impl EditSnapshot {
    pub fn new(content: impl Into<String>) -> Self {
        Self(content.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Snapshot undo/redo for one edit mode.
///
/// `current` is the state shown in the pane. Undo moves it onto the redo
/// stack and restores the newest undo entry; redo is symmetric.
#[derive(Debug, Clone)]
pub struct SnapshotHistory {
    current: EditSnapshot,
    undo_stack: Vec<EditSnapshot>,
    redo_stack: Vec<EditSnapshot>,
    limit: usize,
}

impl SnapshotHistory {
    pub fn new(initial: EditSnapshot, limit: usize) -> Self {
        Self {
            current: initial,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn current(&self) -> &EditSnapshot {
        &self.current
    }

    /// Makes `snapshot` current, pushing the previous one for undo and
    /// clearing redo. Identical content records nothing.
    pub fn record(&mut self, snapshot: EditSnapshot) -> bool {
        if snapshot == self.current {
            return false;
        }
        let previous = std::mem::replace(&mut self.current, snapshot);
        self.undo_stack.push(previous);
        if self.undo_stack.len() > self.limit {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
        true
    }

    pub fn undo(&mut self) -> Result<&EditSnapshot> {
        let snapshot = self
            .undo_stack
            .pop()
            .ok_or(EditorError::HistoryEmpty("undo stack"))?;
        let previous = std::mem::replace(&mut self.current, snapshot);
        self.redo_stack.push(previous);
        Ok(&self.current)
    }

    pub fn redo(&mut self) -> Result<&EditSnapshot> {
        let snapshot = self
            .redo_stack
            .pop()
            .ok_or(EditorError::HistoryEmpty("redo stack"))?;
        let previous = std::mem::replace(&mut self.current, snapshot);
        self.undo_stack.push(previous);
        Ok(&self.current)
    }

    /// Moves `current` to the live state without touching either stack.
    pub fn rebase(&mut self, snapshot: EditSnapshot) {
        self.current = snapshot;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(s: &str) -> EditSnapshot {
        EditSnapshot::new(s)
    }

    #[test]
    fn test_undo_redo_are_symmetric() {
        let mut history = SnapshotHistory::new(snap("a"), 10);
        assert!(history.record(snap("b")));
        assert!(history.record(snap("c")));

        assert_eq!(history.undo().unwrap(), &snap("b"));
        assert_eq!(history.undo().unwrap(), &snap("a"));
        assert!(matches!(history.undo(), Err(EditorError::HistoryEmpty(_))));
        assert_eq!(history.redo().unwrap(), &snap("b"));
        assert_eq!(history.redo().unwrap(), &snap("c"));
        assert!(history.redo().is_err());
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = SnapshotHistory::new(snap("a"), 10);
        history.record(snap("b"));
        history.undo().unwrap();
        assert!(history.can_redo());
        history.record(snap("x"));
        assert!(!history.can_redo());
        assert_eq!(history.undo_len(), 1);
    }

    #[test]
    fn test_identical_snapshot_not_recorded() {
        let mut history = SnapshotHistory::new(snap("a"), 10);
        assert!(!history.record(snap("a")));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_rebase_keeps_stacks() {
        let mut history = SnapshotHistory::new(snap("a"), 10);
        history.record(snap("b"));
        history.rebase(snap("z"));
        assert_eq!(history.current(), &snap("z"));
        assert_eq!(history.undo_len(), 1);
        assert_eq!(history.undo().unwrap(), &snap("a"));
        assert_eq!(history.redo().unwrap(), &snap("z"));
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = SnapshotHistory::new(snap("0"), 2);
        for s in ["1", "2", "3"] {
            history.record(snap(s));
        }
        assert_eq!(history.undo_len(), 2);
        history.undo().unwrap();
        assert_eq!(history.undo().unwrap(), &snap("1"));
    }
}
