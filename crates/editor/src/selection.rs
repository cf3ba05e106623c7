use markup::NodeId;
use std::collections::BTreeSet;

/// Blocks selected in Structural Mode. Transient: cleared on undo, redo,
/// mode switch and delete.
#[derive(Clone, Debug, Default)]
pub struct SelectionSet {
    selected: BTreeSet<NodeId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle membership; returns whether the node is now selected
    pub fn toggle(&mut self, node: NodeId) -> bool {
        if self.selected.remove(&node) {
            false
        } else {
            self.selected.insert(node);
            true
        }
    }

    pub fn add(&mut self, node: NodeId) -> bool {
        self.selected.insert(node)
    }

    pub fn remove(&mut self, node: NodeId) -> bool {
        self.selected.remove(&node)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.selected.contains(&node)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.selected.iter().copied().collect()
    }
}
