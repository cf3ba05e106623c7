/// Lenient markup reader.
///
/// Built on quick-xml's event reader with end-name checks disabled. Raw
/// source slices are kept for text and non-element events so that
/// serializing a parsed tree reproduces its input wherever the input was
/// already well formed.
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::{closes_implicitly, escape_text, is_raw_text, is_void, Attribute, Element};
use crate::{MarkupDocument, NodeId, NodeKind};

pub(crate) fn parse_document(input: &str) -> MarkupDocument {
    let mut doc = MarkupDocument::new();
    let root = doc.root();
    let mut stack: Vec<NodeId> = vec![root];
    // ASCII lowercasing keeps byte offsets intact
    let lower = input.to_ascii_lowercase();
    let mut offset = 0;

    // Raw text elements are scanned by hand; the reader restarts after them.
    'reader: loop {
        let slice = input.get(offset..).unwrap_or_default();
        let mut reader = Reader::from_str(slice);
        {
            let config = reader.config_mut();
            config.check_end_names = false;
            config.allow_unmatched_ends = true;
            config.check_comments = false;
            config.trim_text(false);
        }

        loop {
            let start = offset + reader.buffer_position() as usize;
            let event = reader.read_event();
            let end = offset + reader.buffer_position() as usize;
            let raw = input.get(start..end).unwrap_or_default();
            let parent = stack.last().copied().unwrap_or(root);

            match event {
                Ok(Event::Start(e)) => {
                    let Some(element) = element_from(&e, false) else {
                        append(&mut doc, parent, NodeKind::Text(escape_text(raw)));
                        continue;
                    };
                    close_implicit(&doc, &mut stack, &element.name);
                    let parent = stack.last().copied().unwrap_or(root);
                    let name = element.name.clone();
                    let id = append(&mut doc, parent, NodeKind::Element(element));

                    if is_void(&name) {
                        continue;
                    }
                    if is_raw_text(&name) {
                        match find_raw_text_end(&lower, end, &name) {
                            Some((text_end, resume)) => {
                                let text = input.get(end..text_end).unwrap_or_default();
                                if !text.is_empty() {
                                    append(&mut doc, id, NodeKind::Text(text.to_string()));
                                }
                                offset = resume;
                                continue 'reader;
                            }
                            None => {
                                debug!("unterminated <{}> at byte {}", name, start);
                                let rest = input.get(end..).unwrap_or_default();
                                if !rest.is_empty() {
                                    append(&mut doc, id, NodeKind::Text(rest.to_string()));
                                }
                                break 'reader;
                            }
                        }
                    }
                    stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    let Some(element) = element_from(&e, true) else {
                        append(&mut doc, parent, NodeKind::Text(escape_text(raw)));
                        continue;
                    };
                    close_implicit(&doc, &mut stack, &element.name);
                    let parent = stack.last().copied().unwrap_or(root);
                    append(&mut doc, parent, NodeKind::Element(element));
                }
                Ok(Event::End(e)) => {
                    let name = lowercase_name(e.name().as_ref());
                    // Unmatched end tags are dropped
                    if let Some(pos) = stack
                        .iter()
                        .rposition(|id| doc.tag_name(*id) == Some(name.as_str()))
                    {
                        if pos > 0 {
                            stack.truncate(pos);
                        }
                    }
                }
                Ok(Event::Text(_)) => {
                    if !raw.is_empty() {
                        append(&mut doc, parent, NodeKind::Text(raw.to_string()));
                    }
                }
                Ok(Event::Comment(_)) => {
                    append(&mut doc, parent, NodeKind::Comment(raw.to_string()));
                }
                Ok(Event::DocType(_)) => {
                    append(&mut doc, parent, NodeKind::Doctype(raw.to_string()));
                }
                Ok(Event::Decl(_)) => {
                    append(&mut doc, parent, NodeKind::Declaration(raw.to_string()));
                }
                Ok(Event::PI(_)) => {
                    append(&mut doc, parent, NodeKind::Instruction(raw.to_string()));
                }
                Ok(Event::CData(_)) => {
                    append(&mut doc, parent, NodeKind::CData(raw.to_string()));
                }
                Ok(Event::Eof) => break 'reader,
                Ok(_) => {
                    if !raw.is_empty() {
                        append(&mut doc, parent, NodeKind::Text(raw.to_string()));
                    }
                }
                Err(err) => {
                    // Keep whatever could not be read as plain text
                    debug!("markup error at byte {}: {}", start, err);
                    let rest = input.get(start..).unwrap_or_default();
                    if !rest.is_empty() {
                        append(&mut doc, parent, NodeKind::Text(escape_text(rest)));
                    }
                    break 'reader;
                }
            }
        }
    }

    doc
}

/// Locates `</name` at or after `from`. Returns the end of the text content
/// and the offset just past the closing tag.
fn find_raw_text_end(lower: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    let needle = format!("</{}", name);
    let mut cursor = from;
    loop {
        let found = cursor + lower.get(cursor..)?.find(&needle)?;
        let after_name = found + needle.len();
        let terminated = lower[after_name..]
            .chars()
            .next()
            .map(|c| c == '>' || c.is_ascii_whitespace() || c == '/')
            .unwrap_or(false);
        if terminated {
            let close = after_name + lower[after_name..].find('>')?;
            return Some((found, close + 1));
        }
        cursor = after_name;
    }
}

fn append(doc: &mut MarkupDocument, parent: NodeId, kind: NodeKind) -> NodeId {
    let id = doc.push_node(kind);
    // Freshly created nodes cannot form a cycle
    let _ = doc.append_child(parent, id);
    id
}

fn close_implicit(doc: &MarkupDocument, stack: &mut Vec<NodeId>, incoming: &str) {
    while stack.len() > 1 {
        let Some(open) = stack.last().and_then(|id| doc.tag_name(*id)) else {
            break;
        };
        if !closes_implicitly(open, incoming) {
            break;
        }
        stack.pop();
    }
}

fn lowercase_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).to_ascii_lowercase()
}

fn element_from(e: &BytesStart<'_>, self_closing: bool) -> Option<Element> {
    let name = lowercase_name(e.name().as_ref());
    if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut attrs = Vec::new();
    let mut iter = e.html_attributes();
    iter.with_checks(false);
    for attr in iter {
        // Malformed attribute tails are dropped
        let Ok(attr) = attr else { break };
        let key = lowercase_name(attr.key.as_ref());
        if key.is_empty() {
            continue;
        }
        attrs.push(Attribute {
            name: key,
            value: String::from_utf8_lossy(&attr.value).into_owned(),
        });
    }

    Some(Element {
        name,
        attrs,
        self_closing,
    })
}
