/// Formatting commands for Text Mode.
///
/// Every command means "apply to the current selection or at the caret".
/// A platform rich-text primitive runs the command when one is installed and
/// supports it; otherwise, or when it fails, the command is carried out by
/// direct manipulation of the markup tree.
use base64::Engine;
use markup::{is_block, is_non_content, MarkupDocument, NodeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{EditorConfig, EditorError, Result};

/// Character offset inside a text node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextPosition {
    pub node: NodeId,
    pub offset: usize,
}

impl TextPosition {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSelection {
    pub anchor: TextPosition,
    pub focus: TextPosition,
}

impl TextSelection {
    pub fn caret(position: TextPosition) -> Self {
        Self {
            anchor: position,
            focus: position,
        }
    }

    pub fn range(anchor: TextPosition, focus: TextPosition) -> Self {
        Self { anchor, focus }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn css_value(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
            Self::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Superscript,
    Subscript,
    Align(Alignment),
    OrderedList,
    UnorderedList,
    FontSize(String),
    LineHeight(String),
    ForeColor(String),
    BackColor(String),
    CreateLink { href: String },
    Unlink,
    InsertImage { src: String, alt: String },
    CodeBlock,
    Blockquote,
    HorizontalRule,
    InsertTable { rows: usize, cols: usize },
}

impl FormatCommand {
    /// Command name understood by the platform primitive, if it has one.
    pub fn native_name(&self) -> Option<&'static str> {
        let name = match self {
            Self::Bold => "bold",
            Self::Italic => "italic",
            Self::Underline => "underline",
            Self::Strikethrough => "strikeThrough",
            Self::Superscript => "superscript",
            Self::Subscript => "subscript",
            Self::Align(Alignment::Left) => "justifyLeft",
            Self::Align(Alignment::Center) => "justifyCenter",
            Self::Align(Alignment::Right) => "justifyRight",
            Self::Align(Alignment::Justify) => "justifyFull",
            Self::OrderedList => "insertOrderedList",
            Self::UnorderedList => "insertUnorderedList",
            Self::FontSize(_) => "fontSize",
            Self::ForeColor(_) => "foreColor",
            Self::BackColor(_) => "hiliteColor",
            Self::CreateLink { .. } => "createLink",
            Self::Unlink => "unlink",
            Self::InsertImage { .. } => "insertImage",
            Self::Blockquote => "formatBlock",
            Self::HorizontalRule => "insertHorizontalRule",
            Self::LineHeight(_) | Self::CodeBlock | Self::InsertTable { .. } => return None,
        };
        Some(name)
    }

    /// Tags that count as this inline format, canonical tag first.
    fn inline_tags(&self) -> Option<&'static [&'static str]> {
        let tags: &'static [&'static str] = match self {
            Self::Bold => &["b", "strong"],
            Self::Italic => &["i", "em"],
            Self::Underline => &["u"],
            Self::Strikethrough => &["s", "strike", "del"],
            Self::Superscript => &["sup"],
            Self::Subscript => &["sub"],
            _ => return None,
        };
        Some(tags)
    }
}

#[derive(Debug, Error)]
#[error("native formatting failed: {0}")]
pub struct NativeCommandError(pub String);

/// Platform rich-text editing primitive.
pub trait NativeFormatter: Send {
    fn supports(&self, command: &FormatCommand) -> bool;

    fn execute(
        &mut self,
        doc: &mut MarkupDocument,
        selection: &TextSelection,
        command: &FormatCommand,
    ) -> std::result::Result<Option<TextSelection>, NativeCommandError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormatOutcome {
    /// Selection after the command, when it can still be expressed.
    pub selection: Option<TextSelection>,
    pub used_native: bool,
}

pub struct FormattingCommandExecutor {
    native: Option<Box<dyn NativeFormatter>>,
    max_table_rows: usize,
    max_table_cols: usize,
}

impl FormattingCommandExecutor {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            native: None,
            max_table_rows: config.max_table_rows,
            max_table_cols: config.max_table_cols,
        }
    }

    pub fn with_native(mut self, native: Box<dyn NativeFormatter>) -> Self {
        self.native = Some(native);
        self
    }

    pub fn has_native(&self) -> bool {
        self.native.is_some()
    }

    pub fn execute(
        &mut self,
        doc: &mut MarkupDocument,
        selection: &TextSelection,
        command: &FormatCommand,
    ) -> Result<FormatOutcome> {
        if let FormatCommand::InsertTable { rows, cols } = command {
            self.check_table_size(*rows, *cols)?;
        }

        if let Some(native) = self.native.as_mut() {
            if native.supports(command) {
                let before = doc.clone();
                match native.execute(doc, selection, command) {
                    Ok(selection) => {
                        return Ok(FormatOutcome {
                            selection,
                            used_native: true,
                        })
                    }
                    Err(err) => {
                        warn!("{:?} via native primitive failed, using fallback: {}", command, err);
                        *doc = before;
                    }
                }
            }
        }

        debug!("{:?} via markup fallback", command);
        let selection = DomFormatter::apply(doc, selection, command)?;
        Ok(FormatOutcome {
            selection,
            used_native: false,
        })
    }

    fn check_table_size(&self, rows: usize, cols: usize) -> Result<()> {
        let max = self.max_table_rows.max(self.max_table_cols);
        if rows == 0 || cols == 0 || rows > self.max_table_rows || cols > self.max_table_cols {
            return Err(EditorError::InvalidTableSize { rows, cols, max });
        }
        Ok(())
    }
}

/// Parses the row and column answers of the table prompt.
pub fn parse_table_prompt(rows: &str, cols: &str) -> Option<(usize, usize)> {
    let rows = rows.trim().parse().ok()?;
    let cols = cols.trim().parse().ok()?;
    Some((rows, cols))
}

/// `data:` URI for an image read from a local file.
pub fn image_data_uri(bytes: &[u8], file_name: &str) -> String {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    };
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

/// Markup-tree implementation of every [`FormatCommand`].
pub struct DomFormatter;

impl DomFormatter {
    pub fn apply(
        doc: &mut MarkupDocument,
        selection: &TextSelection,
        command: &FormatCommand,
    ) -> Result<Option<TextSelection>> {
        if let Some(tags) = command.inline_tags() {
            return inline_format(doc, selection, tags, &[], true);
        }
        match command {
            FormatCommand::Align(alignment) => {
                set_block_style(doc, selection, "text-align", alignment.css_value())
            }
            FormatCommand::LineHeight(value) => {
                set_block_style(doc, selection, "line-height", value)
            }
            FormatCommand::FontSize(size) => {
                let style = format!("font-size: {}", size);
                inline_format(doc, selection, &["span"], &[("style", style.as_str())], false)
            }
            FormatCommand::ForeColor(color) => {
                let style = format!("color: {}", color);
                inline_format(doc, selection, &["span"], &[("style", style.as_str())], false)
            }
            FormatCommand::BackColor(color) => {
                let style = format!("background-color: {}", color);
                inline_format(doc, selection, &["span"], &[("style", style.as_str())], false)
            }
            FormatCommand::OrderedList => toggle_list(doc, selection, "ol"),
            FormatCommand::UnorderedList => toggle_list(doc, selection, "ul"),
            FormatCommand::CreateLink { href } => create_link(doc, selection, href),
            FormatCommand::Unlink => unlink(doc, selection),
            FormatCommand::InsertImage { src, alt } => {
                let (_, end) = ordered(doc, selection)?;
                let img = doc.create_element("img");
                if let Some(el) = doc.element_mut(img) {
                    el.set_attr("src", src);
                    el.set_attr("alt", alt);
                }
                insert_at(doc, end, img)?;
                Ok(None)
            }
            FormatCommand::CodeBlock => code_block(doc, selection),
            FormatCommand::Blockquote => blockquote(doc, selection),
            FormatCommand::HorizontalRule => {
                let hr = doc.create_element("hr");
                insert_after_blocks(doc, selection, hr)?;
                Ok(Some(*selection))
            }
            FormatCommand::InsertTable { rows, cols } => {
                let table = build_table(doc, *rows, *cols)?;
                insert_after_blocks(doc, selection, table)?;
                Ok(None)
            }
            _ => Ok(Some(*selection)),
        }
    }
}

fn char_len(doc: &MarkupDocument, node: NodeId) -> Result<usize> {
    doc.text(node)
        .map(|t| t.chars().count())
        .ok_or_else(|| EditorError::InvalidSelection(format!("{} is not a text node", node)))
}

fn validate(doc: &MarkupDocument, position: &TextPosition) -> Result<()> {
    let len = char_len(doc, position.node)?;
    if !doc.is_attached(position.node) {
        return Err(EditorError::InvalidSelection(format!(
            "{} is not in the document",
            position.node
        )));
    }
    if position.offset > len {
        return Err(EditorError::InvalidSelection(format!(
            "offset {} beyond {} characters",
            position.offset, len
        )));
    }
    Ok(())
}

/// Selection endpoints in document order.
fn ordered(doc: &MarkupDocument, selection: &TextSelection) -> Result<(TextPosition, TextPosition)> {
    validate(doc, &selection.anchor)?;
    validate(doc, &selection.focus)?;
    let order = doc.text_nodes(doc.root());
    let rank = |pos: &TextPosition| order.iter().position(|n| *n == pos.node).unwrap_or(0);
    let a = (rank(&selection.anchor), selection.anchor.offset);
    let f = (rank(&selection.focus), selection.focus.offset);
    if a <= f {
        Ok((selection.anchor, selection.focus))
    } else {
        Ok((selection.focus, selection.anchor))
    }
}

/// Text nodes touched by the selection, without splitting.
fn touched_text_nodes(doc: &MarkupDocument, selection: &TextSelection) -> Result<Vec<NodeId>> {
    let (start, end) = ordered(doc, selection)?;
    let order = doc.text_nodes(doc.root());
    let i = order.iter().position(|n| *n == start.node).unwrap_or(0);
    let j = order.iter().position(|n| *n == end.node).unwrap_or(i);
    Ok(order[i..=j.max(i)]
        .iter()
        .copied()
        .filter(|n| !inside_non_content(doc, *n))
        .collect())
}

/// Splits text so the selection covers whole text nodes and returns them.
fn isolate(doc: &mut MarkupDocument, start: TextPosition, end: TextPosition) -> Result<Vec<NodeId>> {
    let order = doc.text_nodes(doc.root());
    let i = order.iter().position(|n| *n == start.node).unwrap_or(0);
    let j = order.iter().position(|n| *n == end.node).unwrap_or(i);
    let mut nodes: Vec<NodeId> = order[i..=j.max(i)].to_vec();

    // End first so the start offset stays valid when both share a node
    if end.offset < char_len(doc, end.node)? {
        doc.split_text(end.node, end.offset)?;
    }
    if start.offset > 0 {
        nodes[0] = doc.split_text(start.node, start.offset)?;
    }

    nodes.retain(|n| {
        !doc.text(*n).unwrap_or_default().is_empty() && !inside_non_content(doc, *n)
    });
    Ok(nodes)
}

fn inside_non_content(doc: &MarkupDocument, node: NodeId) -> bool {
    doc.ancestors(node)
        .any(|a| doc.tag_name(a).map(is_non_content).unwrap_or(false))
}

fn covering_selection(doc: &MarkupDocument, nodes: &[NodeId]) -> Option<TextSelection> {
    let first = *nodes.first()?;
    let last = *nodes.last()?;
    let len = doc.text(last).map(|t| t.chars().count()).unwrap_or(0);
    Some(TextSelection::range(
        TextPosition::new(first, 0),
        TextPosition::new(last, len),
    ))
}

/// Inserts `node` at a text position, splitting the text node if needed.
fn insert_at(doc: &mut MarkupDocument, position: TextPosition, node: NodeId) -> Result<()> {
    let len = char_len(doc, position.node)?;
    if position.offset == 0 {
        doc.insert_before(position.node, node)?;
    } else {
        if position.offset < len {
            doc.split_text(position.node, position.offset)?;
        }
        doc.insert_after(position.node, node)?;
    }
    Ok(())
}

fn new_element(doc: &mut MarkupDocument, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    let id = doc.create_element(tag);
    if let Some(el) = doc.element_mut(id) {
        for (name, value) in attrs {
            el.set_attr(name, value);
        }
    }
    id
}

/// Nearest ancestor among `tags` that does not lie outside the text's block.
fn formatting_ancestor(doc: &MarkupDocument, node: NodeId, tags: &[&str]) -> Option<NodeId> {
    for ancestor in doc.ancestors(node) {
        let name = doc.tag_name(ancestor)?;
        if tags.contains(&name) {
            return Some(ancestor);
        }
        if is_block(name) {
            return None;
        }
    }
    None
}

fn dedup(nodes: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
    let mut out: Vec<NodeId> = Vec::new();
    for node in nodes {
        if !out.contains(&node) {
            out.push(node);
        }
    }
    out
}

fn inline_format(
    doc: &mut MarkupDocument,
    selection: &TextSelection,
    tags: &[&str],
    attrs: &[(&str, &str)],
    toggles: bool,
) -> Result<Option<TextSelection>> {
    let tag = tags[0];
    let (start, end) = ordered(doc, selection)?;

    if start == end {
        let wrapper = new_element(doc, tag, attrs);
        let text = doc.create_text("");
        doc.append_child(wrapper, text)?;
        insert_at(doc, start, wrapper)?;
        return Ok(Some(TextSelection::caret(TextPosition::new(text, 0))));
    }

    let nodes = isolate(doc, start, end)?;
    if nodes.is_empty() {
        return Ok(None);
    }

    if toggles {
        let holders: Vec<Option<NodeId>> = nodes
            .iter()
            .map(|n| formatting_ancestor(doc, *n, tags))
            .collect();
        if holders.iter().all(Option::is_some) {
            for holder in dedup(holders.into_iter().flatten()) {
                doc.unwrap(holder)?;
            }
            return Ok(covering_selection(doc, &nodes));
        }
    }

    for node in &nodes {
        let wrapper = new_element(doc, tag, attrs);
        doc.wrap(*node, wrapper)?;
    }
    Ok(covering_selection(doc, &nodes))
}

fn enclosing_block(doc: &MarkupDocument, node: NodeId) -> Option<NodeId> {
    doc.closest(node, |el| is_block(&el.name))
        .or_else(|| doc.parent(node).filter(|p| doc.element(*p).is_some()))
}

fn enclosing_blocks(doc: &MarkupDocument, selection: &TextSelection) -> Result<Vec<NodeId>> {
    let nodes = touched_text_nodes(doc, selection)?;
    Ok(dedup(nodes.into_iter().filter_map(|n| enclosing_block(doc, n))))
}

/// Block that moves as a whole: list items move with their list, cells
/// with their table.
fn movable_block(doc: &MarkupDocument, block: NodeId) -> NodeId {
    match doc.tag_name(block) {
        Some("li") | Some("dt") | Some("dd") => doc.parent(block).unwrap_or(block),
        Some("td") | Some("th") | Some("caption") => {
            doc.closest(block, |el| el.name == "table").unwrap_or(block)
        }
        _ => block,
    }
}

fn is_cell(doc: &MarkupDocument, node: NodeId) -> bool {
    matches!(doc.tag_name(node), Some("td") | Some("th") | Some("caption"))
}

fn set_block_style(
    doc: &mut MarkupDocument,
    selection: &TextSelection,
    property: &str,
    value: &str,
) -> Result<Option<TextSelection>> {
    for block in enclosing_blocks(doc, selection)? {
        if let Some(el) = doc.element_mut(block) {
            el.set_style_property(property, Some(value));
        }
    }
    Ok(Some(*selection))
}

fn toggle_list(
    doc: &mut MarkupDocument,
    selection: &TextSelection,
    tag: &str,
) -> Result<Option<TextSelection>> {
    let blocks = enclosing_blocks(doc, selection)?;
    if blocks.is_empty() {
        return Ok(None);
    }

    let lists: Vec<Option<NodeId>> = blocks
        .iter()
        .map(|b| {
            if !doc.is_element(*b, "li") {
                return None;
            }
            doc.parent(*b)
                .filter(|p| doc.is_element(*p, "ol") || doc.is_element(*p, "ul"))
        })
        .collect();

    if lists.iter().all(Option::is_some) {
        let lists = dedup(lists.into_iter().flatten());
        if lists.iter().all(|l| doc.is_element(*l, tag)) {
            // Same list type again turns the items back into paragraphs
            for list in lists {
                for item in doc.element_children(list) {
                    if let Some(el) = doc.element_mut(item) {
                        if el.name == "li" {
                            el.name = "p".to_string();
                        }
                    }
                }
                doc.unwrap(list)?;
            }
        } else {
            for list in lists {
                if let Some(el) = doc.element_mut(list) {
                    el.name = tag.to_string();
                }
            }
        }
        return Ok(Some(*selection));
    }

    let mut list: Option<NodeId> = None;
    for block in blocks {
        if is_cell(doc, block) {
            let inner = doc.create_element(tag);
            let item = doc.create_element("li");
            let children = doc.children(block).to_vec();
            doc.replace_children(item, children)?;
            doc.append_child(inner, item)?;
            doc.append_child(block, inner)?;
            continue;
        }
        let target = match list {
            Some(list) => list,
            None => {
                let created = doc.create_element(tag);
                doc.insert_before(block, created)?;
                list = Some(created);
                created
            }
        };
        if doc.is_element(block, "li") {
            doc.append_child(target, block)?;
            continue;
        }
        let item = doc.create_element("li");
        let attrs = doc.element(block).map(|el| el.attrs.clone()).unwrap_or_default();
        if let Some(el) = doc.element_mut(item) {
            el.attrs = attrs;
        }
        let children = doc.children(block).to_vec();
        doc.replace_children(item, children)?;
        doc.append_child(target, item)?;
        doc.detach(block)?;
    }
    Ok(Some(*selection))
}

fn create_link(
    doc: &mut MarkupDocument,
    selection: &TextSelection,
    href: &str,
) -> Result<Option<TextSelection>> {
    if selection.is_collapsed() {
        let (start, _) = ordered(doc, selection)?;
        let anchor = new_element(doc, "a", &[("href", href)]);
        let text = doc.create_text(href);
        doc.append_child(anchor, text)?;
        insert_at(doc, start, anchor)?;
        return Ok(covering_selection(doc, &[text]));
    }
    inline_format(doc, selection, &["a"], &[("href", href)], false)
}

fn unlink(doc: &mut MarkupDocument, selection: &TextSelection) -> Result<Option<TextSelection>> {
    let nodes = touched_text_nodes(doc, selection)?;
    let anchors = dedup(
        nodes
            .into_iter()
            .filter_map(|n| doc.closest(n, |el| el.name == "a")),
    );
    for anchor in anchors {
        doc.unwrap(anchor)?;
    }
    Ok(Some(*selection))
}

fn code_block(doc: &mut MarkupDocument, selection: &TextSelection) -> Result<Option<TextSelection>> {
    let mut caret = None;
    for block in enclosing_blocks(doc, selection)? {
        let text = doc.text_content(block);
        let pre = doc.create_element("pre");
        let code = doc.create_element("code");
        let text_node = doc.create_text(&text);
        doc.append_child(code, text_node)?;
        doc.append_child(pre, code)?;
        if is_cell(doc, block) || doc.is_element(block, "li") {
            doc.replace_children(block, vec![pre])?;
        } else {
            let attrs = doc.element(block).map(|el| el.attrs.clone()).unwrap_or_default();
            if let Some(el) = doc.element_mut(pre) {
                el.attrs = attrs;
            }
            doc.insert_before(block, pre)?;
            doc.detach(block)?;
        }
        caret.get_or_insert(TextSelection::caret(TextPosition::new(text_node, 0)));
    }
    Ok(caret)
}

fn blockquote(doc: &mut MarkupDocument, selection: &TextSelection) -> Result<Option<TextSelection>> {
    let blocks = enclosing_blocks(doc, selection)?;
    let quotes: Vec<Option<NodeId>> = blocks
        .iter()
        .map(|b| doc.closest(*b, |el| el.name == "blockquote"))
        .collect();
    if !quotes.is_empty() && quotes.iter().all(Option::is_some) {
        for quote in dedup(quotes.into_iter().flatten()) {
            doc.unwrap(quote)?;
        }
        return Ok(Some(*selection));
    }

    let movable = dedup(blocks.into_iter().map(|b| movable_block(doc, b)));
    let Some(first) = movable.first().copied() else {
        return Ok(None);
    };
    let quote = doc.create_element("blockquote");
    doc.insert_before(first, quote)?;
    for block in movable {
        doc.append_child(quote, block)?;
    }
    Ok(Some(*selection))
}

fn insert_after_blocks(
    doc: &mut MarkupDocument,
    selection: &TextSelection,
    node: NodeId,
) -> Result<()> {
    let blocks = enclosing_blocks(doc, selection)?;
    match blocks.last() {
        Some(last) => {
            let anchor = movable_block(doc, *last);
            doc.insert_after(anchor, node)?;
        }
        None => {
            let (_, end) = ordered(doc, selection)?;
            insert_at(doc, end, node)?;
        }
    }
    Ok(())
}

fn build_table(doc: &mut MarkupDocument, rows: usize, cols: usize) -> Result<NodeId> {
    let table = doc.create_element("table");
    let body = doc.create_element("tbody");
    doc.append_child(table, body)?;
    for _ in 0..rows {
        let row = doc.create_element("tr");
        for _ in 0..cols {
            let cell = doc.create_element("td");
            let br = doc.create_element("br");
            doc.append_child(cell, br)?;
            doc.append_child(row, cell)?;
        }
        doc.append_child(body, row)?;
    }
    Ok(table)
}
