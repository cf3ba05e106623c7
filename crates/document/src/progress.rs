use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{DocumentError, Result};

/// Paragraph indices marked complete. Marks are progress only and never
/// touch content. Serialized as a sorted integer array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompletedParagraphs(BTreeSet<usize>);

impl CompletedParagraphs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from lease or payload data, dropping indices outside
    /// `0..total`.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>, total: usize) -> Self {
        Self(indices.into_iter().filter(|i| *i < total).collect())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn mark(&mut self, index: usize, total: usize) -> Result<bool> {
        check_range(index, total)?;
        Ok(self.0.insert(index))
    }

    pub fn unmark(&mut self, index: usize) -> bool {
        self.0.remove(&index)
    }

    /// Flips one paragraph and returns its new state.
    pub fn toggle(&mut self, index: usize, total: usize) -> Result<bool> {
        check_range(index, total)?;
        if self.0.remove(&index) {
            Ok(false)
        } else {
            self.0.insert(index);
            Ok(true)
        }
    }

    /// Drops indices that no longer exist after re-segmentation.
    pub fn clamp(&mut self, total: usize) {
        self.0.retain(|i| *i < total);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Completed fraction in `0.0..=1.0`.
    pub fn progress(&self, total: usize) -> f32 {
        if total == 0 {
            return 0.0;
        }
        self.iter().filter(|i| *i < total).count() as f32 / total as f32
    }
}

impl FromIterator<usize> for CompletedParagraphs {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn check_range(index: usize, total: usize) -> Result<()> {
    if index < total {
        Ok(())
    } else {
        Err(DocumentError::ParagraphOutOfRange { index, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_twice_restores_state() {
        let mut completed = CompletedParagraphs::from_indices([1, 3], 5);
        let before = completed.clone();
        assert!(completed.toggle(2, 5).unwrap());
        assert!(!completed.toggle(2, 5).unwrap());
        assert_eq!(completed, before);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let mut completed = CompletedParagraphs::new();
        assert_eq!(
            completed.toggle(5, 5),
            Err(DocumentError::ParagraphOutOfRange { index: 5, total: 5 })
        );
        assert!(completed.is_empty());
    }

    #[test]
    fn test_clamp_and_progress() {
        let mut completed = CompletedParagraphs::from_indices([0, 1, 9], 10);
        assert_eq!(completed.progress(10), 0.3);
        completed.clamp(2);
        assert_eq!(completed.to_vec(), vec![0, 1]);
        assert_eq!(completed.progress(4), 0.5);
        assert_eq!(completed.progress(0), 0.0);
    }

    #[test]
    fn test_serializes_as_sorted_array() {
        let completed: CompletedParagraphs = [4, 0, 2].into_iter().collect();
        assert_eq!(serde_json::to_string(&completed).unwrap(), "[0,2,4]");
    }
}
