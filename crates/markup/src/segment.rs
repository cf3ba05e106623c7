/// Paragraph segmentation.
///
/// Block-level units are tagged in document order with a dense index and a
/// namespaced id. Indices are derived from document structure only, so
/// independently segmented versions of the same content line up by index.
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{ensure_shell, is_block, is_container, is_non_content, is_paragraph_element};
use crate::{MarkupDocument, NodeId, NodeKind};

pub const PARAGRAPH_INDEX_ATTR: &str = "data-paragraph-index";
pub const PARAGRAPH_ID_ATTR: &str = "data-paragraph-id";

/// A tagged block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    pub index: usize,
    pub node: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentedMarkup {
    pub markup: String,
    pub paragraph_count: usize,
}

/// Tags `raw` and returns the tagged markup.
pub fn segment(raw: &str, namespace: &str) -> String {
    segment_with_count(raw, namespace).markup
}

/// Like [`segment`], also reporting how many paragraphs were tagged. Input
/// without any qualifying block comes back unchanged.
pub fn segment_with_count(raw: &str, namespace: &str) -> SegmentedMarkup {
    let mut doc = MarkupDocument::parse(raw);
    if qualifying_blocks(&doc).is_empty() {
        debug!(namespace, "no paragraph blocks found");
        return SegmentedMarkup {
            markup: raw.to_string(),
            paragraph_count: 0,
        };
    }
    let paragraphs = segment_document(&mut doc, namespace);
    SegmentedMarkup {
        markup: doc.serialize(),
        paragraph_count: paragraphs.len(),
    }
}

/// Repairs and tags a parsed document in place.
pub fn segment_document(doc: &mut MarkupDocument, namespace: &str) -> Vec<Paragraph> {
    let blocks = qualifying_blocks(doc);
    if blocks.is_empty() {
        return Vec::new();
    }
    if let Err(err) = ensure_shell(doc) {
        warn!("shell repair failed: {}", err);
    }

    let blocks = qualifying_blocks(doc);
    let all_elements: Vec<NodeId> = doc
        .descendants(doc.root())
        .filter(|id| doc.element(*id).is_some())
        .collect();
    for id in all_elements {
        if blocks.contains(&id) {
            continue;
        }
        if let Some(el) = doc.element_mut(id) {
            el.remove_attr(PARAGRAPH_INDEX_ATTR);
            el.remove_attr(PARAGRAPH_ID_ATTR);
        }
    }

    let mut paragraphs = Vec::with_capacity(blocks.len());
    for (index, node) in blocks.into_iter().enumerate() {
        if let Some(el) = doc.element_mut(node) {
            el.set_attr(PARAGRAPH_INDEX_ATTR, &index.to_string());
            el.set_attr(PARAGRAPH_ID_ATTR, &paragraph_id(namespace, index));
        }
        paragraphs.push(Paragraph { index, node });
    }
    debug!(namespace, count = paragraphs.len(), "segmented document");
    paragraphs
}

pub fn paragraph_id(namespace: &str, index: usize) -> String {
    if namespace.is_empty() {
        index.to_string()
    } else {
        format!("{}-{}", namespace, index)
    }
}

/// Blocks that become paragraphs, in document order. The outermost
/// qualifying block wins; nothing below it is considered.
pub fn qualifying_blocks(doc: &MarkupDocument) -> Vec<NodeId> {
    let mut out = Vec::new();
    let start = doc.body().unwrap_or(doc.root());
    collect_blocks(doc, start, &mut out);
    out
}

fn collect_blocks(doc: &MarkupDocument, id: NodeId, out: &mut Vec<NodeId>) {
    for child in doc.children(id) {
        let Some(el) = doc.element(*child) else {
            continue;
        };
        if is_non_content(&el.name) {
            continue;
        }
        if qualifies(doc, *child) {
            out.push(*child);
        } else {
            collect_blocks(doc, *child, out);
        }
    }
}

fn qualifies(doc: &MarkupDocument, id: NodeId) -> bool {
    let Some(name) = doc.tag_name(id) else {
        return false;
    };
    if is_paragraph_element(name) {
        return true;
    }
    if !is_container(name) {
        return false;
    }
    let mut has_text = false;
    for child in doc.children(id) {
        match doc.kind(*child) {
            Some(NodeKind::Text(raw)) if !raw.trim().is_empty() => has_text = true,
            Some(NodeKind::Element(el)) if is_block(&el.name) => return false,
            _ => {}
        }
    }
    has_text
}

/// Tagged paragraphs of an already segmented document, in document order.
pub fn tagged_paragraphs(doc: &MarkupDocument) -> Vec<Paragraph> {
    doc.descendants(doc.root())
        .filter_map(|node| {
            let index = doc.element(node)?.attr(PARAGRAPH_INDEX_ATTR)?.parse().ok()?;
            Some(Paragraph { index, node })
        })
        .collect()
}

/// Element tagged with `index`.
pub fn paragraph_node(doc: &MarkupDocument, index: usize) -> Option<NodeId> {
    tagged_paragraphs(doc)
        .into_iter()
        .find(|p| p.index == index)
        .map(|p| p.node)
}

/// Index of the paragraph containing `node`, if any.
pub fn paragraph_of(doc: &MarkupDocument, node: NodeId) -> Option<usize> {
    let tagged = doc.closest(node, |el| el.has_attr(PARAGRAPH_INDEX_ATTR))?;
    doc.element(tagged)?.attr(PARAGRAPH_INDEX_ATTR)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_assigns_dense_indices() {
        let out = segment_with_count("<h1>T</h1><p>a</p><ul><li>x</li><li>y</li></ul>", "orig");
        assert_eq!(out.paragraph_count, 4);
        let doc = MarkupDocument::parse(&out.markup);
        let paragraphs = tagged_paragraphs(&doc);
        let indices: Vec<_> = paragraphs.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        let li = paragraph_node(&doc, 3).unwrap();
        assert_eq!(doc.text_content(li), "y");
        assert_eq!(
            doc.element(li).unwrap().attr(PARAGRAPH_ID_ATTR).as_deref(),
            Some("orig-3")
        );
    }

    #[test]
    fn test_no_blocks_returns_input_unchanged() {
        let input = "just text <span>inline</span>";
        let out = segment_with_count(input, "ns");
        assert_eq!(out.paragraph_count, 0);
        assert_eq!(out.markup, input);
    }

    #[test]
    fn test_segment_is_idempotent() {
        let once = segment("<div>Intro<p>nested</p></div><p>a<p>b", "manual");
        assert_eq!(segment(&once, "manual"), once);
    }

    #[test]
    fn test_outermost_block_wins() {
        let out = segment_with_count("<blockquote><p>a</p><p>b</p></blockquote>", "");
        assert_eq!(out.paragraph_count, 1);
    }

    #[test]
    fn test_container_with_direct_text() {
        let out = segment_with_count("<div>loose text</div><div><p>inner</p></div>", "ns");
        assert_eq!(out.paragraph_count, 2);
        let doc = MarkupDocument::parse(&out.markup);
        let first = paragraph_node(&doc, 0).unwrap();
        assert!(doc.is_element(first, "div"));
        let second = paragraph_node(&doc, 1).unwrap();
        assert!(doc.is_element(second, "p"));
    }

    #[test]
    fn test_scripts_and_head_are_skipped() {
        let input = "<html><head><title>t</title></head><body>\
                     <script>var p = '<p>x</p>';</script><noscript><p>n</p></noscript>\
                     <p>real</p></body></html>";
        let out = segment_with_count(input, "ns");
        assert_eq!(out.paragraph_count, 1);
    }

    #[test]
    fn test_stale_tags_are_removed() {
        let input = "<div data-paragraph-index=\"7\"><p>a</p></div>";
        let out = segment(input, "ns");
        assert!(!out.contains("data-paragraph-index=\"7\""));
        assert!(out.contains("data-paragraph-index=\"0\""));
    }

    #[test]
    fn test_paragraph_of_inline_node() {
        let out = segment("<p>a</p><p>b <em>c</em></p>", "ns");
        let doc = MarkupDocument::parse(&out);
        let em = doc.find_first("em").unwrap();
        assert_eq!(paragraph_of(&doc, em), Some(1));
        assert_eq!(paragraph_of(&doc, doc.body().unwrap()), None);
    }
}
