use document::CompletedParagraphs;
use markup::classes::{PARAGRAPH_COMPLETE, PARAGRAPH_HIGHLIGHT};
use markup::{MarkupDocument, NodeId, Paragraph};

use crate::PaneId;

/// Scroll geometry of a pane, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    /// `scroll_top / (scroll_height - client_height)`, 0 when not scrollable.
    pub fn ratio(&self) -> f64 {
        let max = self.max_scroll();
        if max <= 0.0 {
            0.0
        } else {
            (self.scroll_top / max).clamp(0.0, 1.0)
        }
    }
}

/// A rendering surface showing one document version in isolation.
///
/// Implementations own their content tree and layout; everything the sync
/// controller and the editor need goes through this capability.
pub trait Pane {
    fn id(&self) -> PaneId;

    /// Replaces the whole content. Element handles from before are invalid.
    fn render(&mut self, markup: &str);

    fn document(&self) -> &MarkupDocument;

    fn document_mut(&mut self) -> &mut MarkupDocument;

    /// Recomputes layout after in-place mutation of the document.
    fn relayout(&mut self);

    fn scroll_metrics(&self) -> ScrollMetrics;

    fn set_scroll_top(&mut self, top: f64);

    /// Top offset of a paragraph, if it is rendered.
    fn paragraph_offset(&self, index: usize) -> Option<f64>;

    fn content(&self) -> String {
        self.document().serialize()
    }

    fn paragraphs(&self) -> Vec<Paragraph> {
        markup::tagged_paragraphs(self.document())
    }

    fn paragraph_count(&self) -> usize {
        self.paragraphs().len()
    }

    fn paragraph_node(&self, index: usize) -> Option<NodeId> {
        markup::paragraph_node(self.document(), index)
    }

    fn scroll_ratio(&self) -> f64 {
        self.scroll_metrics().ratio()
    }

    fn scroll_to_ratio(&mut self, ratio: f64) {
        let max = self.scroll_metrics().max_scroll();
        self.set_scroll_top(max * ratio.clamp(0.0, 1.0));
    }

    /// Paragraph whose top is nearest to `offset`.
    fn paragraph_at_offset(&self, offset: f64) -> Option<usize> {
        self.paragraphs()
            .iter()
            .filter_map(|p| self.paragraph_offset(p.index).map(|top| (p.index, top)))
            .min_by(|a, b| (a.1 - offset).abs().total_cmp(&(b.1 - offset).abs()))
            .map(|(index, _)| index)
    }

    /// Removes `class` from every element. Returns how many lost it.
    fn clear_class(&mut self, class: &str) -> usize {
        let doc = self.document_mut();
        let elements: Vec<NodeId> = doc.descendants(doc.root()).collect();
        let mut cleared = 0;
        for id in elements {
            if let Some(el) = doc.element_mut(id) {
                if el.remove_class(class) {
                    cleared += 1;
                }
            }
        }
        cleared
    }

    fn add_paragraph_class(&mut self, index: usize, class: &str) -> bool {
        let Some(node) = self.paragraph_node(index) else {
            return false;
        };
        self.document_mut()
            .element_mut(node)
            .map(|el| el.add_class(class))
            .unwrap_or(false)
    }

    /// Clears previous decoration, then highlights `active` and dims
    /// completed paragraphs. Applying the same state twice is a no-op.
    fn apply_decoration(&mut self, active: Option<usize>, completed: &CompletedParagraphs) {
        self.clear_class(PARAGRAPH_HIGHLIGHT);
        self.clear_class(PARAGRAPH_COMPLETE);
        if let Some(index) = active {
            self.add_paragraph_class(index, PARAGRAPH_HIGHLIGHT);
        }
        for index in completed.iter() {
            self.add_paragraph_class(index, PARAGRAPH_COMPLETE);
        }
    }

    /// Indices of paragraphs currently carrying `class`.
    fn paragraphs_with_class(&self, class: &str) -> Vec<usize> {
        let doc = self.document();
        self.paragraphs()
            .into_iter()
            .filter(|p| doc.element(p.node).map(|el| el.has_class(class)).unwrap_or(false))
            .map(|p| p.index)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_of_unscrollable_pane_is_zero() {
        let metrics = ScrollMetrics {
            scroll_top: 0.0,
            scroll_height: 300.0,
            client_height: 600.0,
        };
        assert_eq!(metrics.ratio(), 0.0);
    }

    #[test]
    fn test_ratio() {
        let metrics = ScrollMetrics {
            scroll_top: 150.0,
            scroll_height: 900.0,
            client_height: 600.0,
        };
        assert_eq!(metrics.ratio(), 0.5);
    }
}
