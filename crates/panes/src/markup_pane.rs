use markup::MarkupDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Pane, PaneId, ScrollMetrics};

/// Text layout estimate used by [`MarkupPane`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutMetrics {
    pub line_height: f64,
    pub chars_per_line: usize,
    pub paragraph_gap: f64,
    pub client_height: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            line_height: 20.0,
            chars_per_line: 80,
            paragraph_gap: 12.0,
            client_height: 600.0,
        }
    }
}

impl LayoutMetrics {
    /// Height of a block holding `chars` characters; at least one line.
    pub fn block_height(&self, chars: usize) -> f64 {
        let per_line = self.chars_per_line.max(1);
        let lines = chars.div_ceil(per_line).max(1);
        lines as f64 * self.line_height
    }
}

/// In-memory pane: a parsed document with an estimated vertical layout of
/// its tagged paragraphs.
#[derive(Debug, Clone)]
pub struct MarkupPane {
    id: PaneId,
    document: MarkupDocument,
    metrics: LayoutMetrics,
    offsets: BTreeMap<usize, f64>,
    scroll_height: f64,
    scroll_top: f64,
}

impl MarkupPane {
    pub fn new(id: PaneId, metrics: LayoutMetrics) -> Self {
        Self {
            id,
            document: MarkupDocument::new(),
            metrics,
            offsets: BTreeMap::new(),
            scroll_height: 0.0,
            scroll_top: 0.0,
        }
    }

    pub fn with_content(id: PaneId, metrics: LayoutMetrics, markup: &str) -> Self {
        let mut pane = Self::new(id, metrics);
        pane.render(markup);
        pane
    }

    pub fn metrics(&self) -> LayoutMetrics {
        self.metrics
    }
}

impl Pane for MarkupPane {
    fn id(&self) -> PaneId {
        self.id
    }

    fn render(&mut self, markup: &str) {
        self.document = MarkupDocument::parse(markup);
        self.relayout();
        debug!(pane = %self.id, paragraphs = self.offsets.len(), "rendered pane");
    }

    fn document(&self) -> &MarkupDocument {
        &self.document
    }

    fn document_mut(&mut self) -> &mut MarkupDocument {
        &mut self.document
    }

    fn relayout(&mut self) {
        let mut offsets = BTreeMap::new();
        let mut cursor = 0.0;
        for paragraph in markup::tagged_paragraphs(&self.document) {
            let chars = self.document.text_content(paragraph.node).chars().count();
            offsets.insert(paragraph.index, cursor);
            cursor += self.metrics.block_height(chars) + self.metrics.paragraph_gap;
        }
        self.offsets = offsets;
        self.scroll_height = cursor;
        let max = (self.scroll_height - self.metrics.client_height).max(0.0);
        self.scroll_top = self.scroll_top.min(max);
    }

    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll_top,
            scroll_height: self.scroll_height,
            client_height: self.metrics.client_height,
        }
    }

    fn set_scroll_top(&mut self, top: f64) {
        let max = self.scroll_metrics().max_scroll();
        self.scroll_top = top.clamp(0.0, max);
    }

    fn paragraph_offset(&self, index: usize) -> Option<f64> {
        self.offsets.get(&index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> LayoutMetrics {
        LayoutMetrics {
            line_height: 10.0,
            chars_per_line: 10,
            paragraph_gap: 0.0,
            client_height: 20.0,
        }
    }

    #[test]
    fn test_layout_offsets() {
        let tagged = markup::segment("<p>short</p><p>exactly twenty chars</p><p>x</p>", "t");
        let pane = MarkupPane::with_content(PaneId::Original, metrics(), &tagged);
        assert_eq!(pane.paragraph_offset(0), Some(0.0));
        assert_eq!(pane.paragraph_offset(1), Some(10.0));
        assert_eq!(pane.paragraph_offset(2), Some(30.0));
        assert_eq!(pane.scroll_metrics().scroll_height, 40.0);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let tagged = markup::segment("<p>a</p><p>b</p><p>c</p><p>d</p>", "t");
        let mut pane = MarkupPane::with_content(PaneId::Original, metrics(), &tagged);
        pane.set_scroll_top(500.0);
        assert_eq!(pane.scroll_metrics().scroll_top, 20.0);
        assert_eq!(pane.scroll_ratio(), 1.0);
        pane.scroll_to_ratio(0.5);
        assert_eq!(pane.scroll_metrics().scroll_top, 10.0);
        assert_eq!(pane.paragraph_at_offset(10.0), Some(1));
    }

    #[test]
    fn test_decoration_replaces_previous_state() {
        let tagged = markup::segment("<p>a</p><p>b</p><p>c</p>", "t");
        let mut pane = MarkupPane::with_content(PaneId::Translation, metrics(), &tagged);
        let completed = document::CompletedParagraphs::from_indices([2], 3);

        pane.apply_decoration(Some(0), &completed);
        pane.apply_decoration(Some(1), &completed);
        let once = pane.content();
        pane.apply_decoration(Some(1), &completed);

        assert_eq!(pane.content(), once);
        assert_eq!(pane.paragraphs_with_class("paragraph-highlight"), vec![1]);
        assert_eq!(pane.paragraphs_with_class("paragraph-complete"), vec![2]);
    }
}
