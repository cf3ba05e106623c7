use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

use crate::{parse, MarkupError, Result};

/// Handle to a node inside one [`MarkupDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Attribute with its value kept in escaped (serialized) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<Attribute>,
    /// Written as `<name/>` in the source.
    pub self_closing: bool,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_lowercase(),
            attrs: Vec::new(),
            self_closing: false,
        }
    }

    pub fn raw_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Attribute value with character references resolved.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.raw_attr(name).map(|raw| unescape_text(raw).into_owned())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a.name == name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = quick_xml::escape::escape(value).into_owned();
        match self.attrs.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = escaped,
            None => self.attrs.push(Attribute {
                name: name.to_ascii_lowercase(),
                value: escaped,
            }),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> bool {
        let before = self.attrs.len();
        self.attrs.retain(|a| a.name != name);
        before != self.attrs.len()
    }

    pub fn classes(&self) -> Vec<String> {
        self.attr("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().iter().any(|c| c == class)
    }

    /// Returns `false` when the class was already present.
    pub fn add_class(&mut self, class: &str) -> bool {
        let mut classes = self.classes();
        if classes.iter().any(|c| c == class) {
            return false;
        }
        classes.push(class.to_string());
        self.set_attr("class", &classes.join(" "));
        true
    }

    /// Returns `false` when the class was not present. Drops the attribute
    /// once no class remains.
    pub fn remove_class(&mut self, class: &str) -> bool {
        let mut classes = self.classes();
        let before = classes.len();
        classes.retain(|c| c != class);
        if classes.len() == before {
            return false;
        }
        if classes.is_empty() {
            self.remove_attr("class");
        } else {
            self.set_attr("class", &classes.join(" "));
        }
        true
    }

    pub fn style_property(&self, property: &str) -> Option<String> {
        let style = self.attr("style")?;
        parse_style(&style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Sets or, with `None`, removes one inline style declaration.
    pub fn set_style_property(&mut self, property: &str, value: Option<&str>) {
        let mut declarations = self.attr("style").map(|s| parse_style(&s)).unwrap_or_default();
        declarations.retain(|(name, _)| name != property);
        if let Some(value) = value {
            declarations.push((property.to_string(), value.to_string()));
        }
        if declarations.is_empty() {
            self.remove_attr("style");
        } else {
            let style = declarations
                .iter()
                .map(|(name, value)| format!("{}: {}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            self.set_attr("style", &style);
        }
    }
}

fn parse_style(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name.is_empty() || value.is_empty() {
                None
            } else {
                Some((name, value.to_string()))
            }
        })
        .collect()
}

/// Node payloads. Everything except elements keeps its source text verbatim
/// so that serialization reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element(Element),
    /// Escaped character data.
    Text(String),
    Comment(String),
    Doctype(String),
    Declaration(String),
    Instruction(String),
    CData(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed markup tree. Removed nodes stay in the arena detached from
/// the root so outstanding [`NodeId`]s never dangle.
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    nodes: Vec<Node>,
}

impl Default for MarkupDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupDocument {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parses leniently; never fails. Unparseable trailing input is kept as text.
    pub fn parse(input: &str) -> Self {
        parse::parse_document(input)
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(MarkupError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(MarkupError::NodeNotFound(id))
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element(el)) => Some(el),
            _ => None,
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.name.as_str())
    }

    pub fn is_element(&self, id: NodeId, name: &str) -> bool {
        self.tag_name(id) == Some(name)
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text(_)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.element(*c).is_some())
            .collect()
    }

    pub(crate) fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.push_node(NodeKind::Element(Element::new(name)))
    }

    /// Creates a detached text node; `text` is escaped.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(escape_text(text)))
    }

    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.push_node(kind)
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        if id == self.root() {
            return true;
        }
        self.ancestors(id).any(|a| a == self.root())
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.parent(id),
        }
    }

    /// Pre-order traversal of everything below `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut stack: Vec<NodeId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { doc: self, stack }
    }

    pub fn is_ancestor_of(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    pub fn find_first(&self, name: &str) -> Option<NodeId> {
        self.descendants(self.root()).find(|id| self.is_element(*id, name))
    }

    pub fn elements_named(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .filter(|id| self.is_element(*id, name))
            .collect()
    }

    pub fn body(&self) -> Option<NodeId> {
        self.find_first("body")
    }

    pub fn head(&self) -> Option<NodeId> {
        self.find_first("head")
    }

    /// Closest element starting at `id` itself and walking up.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&Element) -> bool) -> Option<NodeId> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find(|n| self.element(*n).map(&predicate).unwrap_or(false))
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Removes `id` from its parent. The subtree stays intact.
    pub fn detach(&mut self, id: NodeId) -> Result<()> {
        let parent = self.node(id)?.parent;
        if let Some(parent) = parent {
            self.node_mut(parent)?.children.retain(|c| *c != id);
            self.node_mut(id)?.parent = None;
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let len = self.node(parent)?.children.len();
        self.insert_child(parent, len, child)
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) -> Result<()> {
        self.node(parent)?;
        self.node(child)?;
        if child == parent || self.is_ancestor_of(child, parent) || child == self.root() {
            return Err(MarkupError::InvalidHierarchy { parent, child });
        }
        self.detach(child)?;
        let node = self.node_mut(parent)?;
        let index = index.min(node.children.len());
        node.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        let parent = self.parent(reference).ok_or(MarkupError::Detached(reference))?;
        self.detach(node)?;
        let index = self.index_in_parent(reference).unwrap_or(0);
        self.insert_child(parent, index, node)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> Result<()> {
        let parent = self.parent(reference).ok_or(MarkupError::Detached(reference))?;
        self.detach(node)?;
        let index = self.index_in_parent(reference).map(|i| i + 1).unwrap_or(0);
        self.insert_child(parent, index, node)
    }

    /// Puts `wrapper` where `target` is and moves `target` inside it.
    pub fn wrap(&mut self, target: NodeId, wrapper: NodeId) -> Result<()> {
        if self.element(wrapper).is_none() {
            return Err(MarkupError::NotAnElement(wrapper));
        }
        self.insert_before(target, wrapper)?;
        self.append_child(wrapper, target)
    }

    /// Replaces element `id` by its children.
    pub fn unwrap(&mut self, id: NodeId) -> Result<()> {
        if self.element(id).is_none() {
            return Err(MarkupError::NotAnElement(id));
        }
        let parent = self.parent(id).ok_or(MarkupError::Detached(id))?;
        let mut index = self.index_in_parent(id).unwrap_or(0);
        for child in self.children(id).to_vec() {
            self.insert_child(parent, index, child)?;
            index += 1;
        }
        self.detach(id)
    }

    pub fn replace_children(&mut self, parent: NodeId, children: Vec<NodeId>) -> Result<()> {
        for existing in self.children(parent).to_vec() {
            self.detach(existing)?;
        }
        for child in children {
            self.append_child(parent, child)?;
        }
        Ok(())
    }

    pub fn raw_text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            Some(NodeKind::Text(raw)) => Some(raw),
            _ => None,
        }
    }

    /// Visible text of a text node with references resolved.
    pub fn text(&self, id: NodeId) -> Option<String> {
        self.raw_text(id).map(|raw| unescape_text(raw).into_owned())
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Text(raw) => {
                *raw = escape_text(text);
                Ok(())
            }
            _ => Err(MarkupError::NotAnElement(id)),
        }
    }

    /// Concatenated visible text of the subtree, raw-text elements excluded.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(text) = self.text(id) {
            return text;
        }
        let mut out = String::new();
        let mut skip_below: Vec<NodeId> = Vec::new();
        for node in self.descendants(id) {
            if skip_below.iter().any(|s| self.is_ancestor_of(*s, node)) {
                continue;
            }
            match self.kind(node) {
                Some(NodeKind::Element(el)) if crate::is_non_content(&el.name) => {
                    skip_below.push(node)
                }
                Some(NodeKind::Text(raw)) => out.push_str(&unescape_text(raw)),
                _ => {}
            }
        }
        out
    }

    /// Replaces the children of `id` with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<()> {
        let text_node = self.create_text(text);
        self.replace_children(id, vec![text_node])
    }

    /// Text nodes below `id` in document order.
    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id).filter(|n| self.is_text(*n)).collect()
    }

    /// Splits a text node at a character offset. Returns the node holding the
    /// text after the split point; it is inserted right after `id`.
    pub fn split_text(&mut self, id: NodeId, offset: usize) -> Result<NodeId> {
        let text = self.text(id).ok_or(MarkupError::NotAnElement(id))?;
        let chars = text.chars().count();
        if offset > chars {
            return Err(MarkupError::OffsetOutOfRange { node: id, offset });
        }
        let byte = text
            .char_indices()
            .nth(offset)
            .map(|(b, _)| b)
            .unwrap_or(text.len());
        let (head, tail) = text.split_at(byte);
        let tail = tail.to_string();
        self.set_text(id, head)?;
        let tail_node = self.create_text(&tail);
        self.insert_after(id, tail_node)?;
        Ok(tail_node)
    }

    /// Copies a subtree from `other` into this arena, detached.
    pub fn import_subtree(&mut self, other: &MarkupDocument, id: NodeId) -> Result<NodeId> {
        let kind = other.node(id)?.kind.clone();
        let copy = self.push_node(kind);
        for child in other.children(id) {
            let child_copy = self.import_subtree(other, *child)?;
            self.append_child(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Deep copy of a subtree inside this arena, detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let snapshot = self.clone();
        self.import_subtree(&snapshot, id)
    }
}

pub struct Ancestors<'a> {
    doc: &'a MarkupDocument,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.parent(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    doc: &'a MarkupDocument,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let children = self.doc.children(current);
        self.stack.extend(children.iter().rev().copied());
        Some(current)
    }
}

/// Escapes character data for text content.
pub fn escape_text(text: &str) -> String {
    quick_xml::escape::partial_escape(text).into_owned()
}

/// Resolves XML and common HTML references. Input with unknown references is
/// returned unchanged.
pub fn unescape_text(raw: &str) -> Cow<'_, str> {
    match quick_xml::escape::unescape_with(raw, resolve_entity) {
        Ok(text) => text,
        Err(_) => Cow::Borrowed(raw),
    }
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    let resolved = match entity {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        "nbsp" => "\u{a0}",
        "ensp" => "\u{2002}",
        "emsp" => "\u{2003}",
        "thinsp" => "\u{2009}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "hellip" => "\u{2026}",
        "middot" => "\u{b7}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "bull" => "\u{2022}",
        "times" => "\u{d7}",
        _ => return None,
    };
    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_manipulation() {
        let mut el = Element::new("P");
        assert_eq!(el.name, "p");
        assert!(el.add_class("a"));
        assert!(!el.add_class("a"));
        assert!(el.add_class("b"));
        assert_eq!(el.attr("class").as_deref(), Some("a b"));
        assert!(el.remove_class("a"));
        assert!(el.remove_class("b"));
        assert!(!el.has_attr("class"));
    }

    #[test]
    fn test_style_properties() {
        let mut el = Element::new("p");
        el.set_style_property("text-align", Some("center"));
        el.set_style_property("line-height", Some("1.5"));
        assert_eq!(el.style_property("text-align").as_deref(), Some("center"));
        el.set_style_property("text-align", Some("right"));
        assert_eq!(
            el.attr("style").as_deref(),
            Some("line-height: 1.5; text-align: right")
        );
        el.set_style_property("line-height", None);
        el.set_style_property("text-align", None);
        assert!(!el.has_attr("style"));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let mut el = Element::new("a");
        el.set_attr("href", "https://example.com/?a=1&b=\"2\"");
        assert_eq!(
            el.raw_attr("href"),
            Some("https://example.com/?a=1&amp;b=&quot;2&quot;")
        );
        assert_eq!(
            el.attr("href").as_deref(),
            Some("https://example.com/?a=1&b=\"2\"")
        );
    }

    #[test]
    fn test_tree_mutation() {
        let mut doc = MarkupDocument::new();
        let root = doc.root();
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        let text = doc.create_text("a < b");
        doc.append_child(root, div).unwrap();
        doc.append_child(div, p).unwrap();
        doc.append_child(p, text).unwrap();

        assert_eq!(doc.raw_text(text), Some("a &lt; b"));
        assert_eq!(doc.text_content(div), "a < b");
        assert!(doc.is_ancestor_of(div, text));

        // Cannot move a node below its own descendant
        assert!(doc.append_child(p, div).is_err());

        doc.unwrap(p).unwrap();
        assert_eq!(doc.children(div), &[text]);
        assert!(!doc.is_attached(p));
    }

    #[test]
    fn test_split_text() {
        let mut doc = MarkupDocument::new();
        let p = doc.create_element("p");
        doc.append_child(doc.root(), p).unwrap();
        let text = doc.create_text("héllo world");
        doc.append_child(p, text).unwrap();

        let tail = doc.split_text(text, 5).unwrap();
        assert_eq!(doc.text(text).as_deref(), Some("héllo"));
        assert_eq!(doc.text(tail).as_deref(), Some(" world"));
        assert!(doc.split_text(tail, 42).is_err());
    }

    #[test]
    fn test_unescape_html_entities() {
        assert_eq!(unescape_text("a&nbsp;b&amp;c"), "a\u{a0}b&c");
        assert_eq!(unescape_text("&#65;"), "A");
        // Unknown references are left as they are
        assert_eq!(unescape_text("&bogus;"), "&bogus;");
    }
}
