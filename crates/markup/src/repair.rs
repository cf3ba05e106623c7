use tracing::debug;

use crate::{is_head_element, MarkupDocument, NodeId, NodeKind, Result};

pub const DEFAULT_DOCTYPE: &str = "<!DOCTYPE html>";

/// Synthesizes the `<!DOCTYPE html><html><head></head><body></body></html>`
/// shell around partial content. Stray top-level nodes move into `<body>`,
/// head-only elements into `<head>`. Returns whether anything changed.
/// Running it twice is a no-op the second time.
pub fn ensure_shell(doc: &mut MarkupDocument) -> Result<bool> {
    let root = doc.root();
    let mut changed = false;

    let has_doctype = doc
        .children(root)
        .iter()
        .any(|id| matches!(doc.kind(*id), Some(NodeKind::Doctype(_))));
    if !has_doctype {
        let doctype = doc.create_node(NodeKind::Doctype(DEFAULT_DOCTYPE.to_string()));
        let index = doc
            .children(root)
            .iter()
            .position(|id| !matches!(doc.kind(*id), Some(NodeKind::Declaration(_))))
            .unwrap_or(doc.children(root).len());
        doc.insert_child(root, index, doctype)?;
        changed = true;
    }

    let html = match doc.element_children(root).into_iter().find(|id| doc.is_element(*id, "html")) {
        Some(html) => html,
        None => {
            let html = doc.create_element("html");
            doc.append_child(root, html)?;
            changed = true;
            html
        }
    };

    // Everything at the top level that is content belongs inside <html>
    let mut before_html = true;
    let mut index = 0;
    for child in doc.children(root).to_vec() {
        if child == html {
            before_html = false;
            index = doc.children(html).len();
            continue;
        }
        if !is_stray(doc, child) {
            continue;
        }
        if before_html {
            doc.insert_child(html, index, child)?;
            index += 1;
        } else {
            doc.append_child(html, child)?;
        }
        changed = true;
    }

    let head = match direct_child(doc, html, "head") {
        Some(head) => head,
        None => {
            let head = doc.create_element("head");
            doc.insert_child(html, 0, head)?;
            changed = true;
            head
        }
    };
    let body = match direct_child(doc, html, "body") {
        Some(body) => body,
        None => {
            let body = doc.create_element("body");
            doc.append_child(html, body)?;
            changed = true;
            body
        }
    };

    let mut before_body = true;
    let mut index = 0;
    for child in doc.children(html).to_vec() {
        if child == head {
            continue;
        }
        if child == body {
            before_body = false;
            continue;
        }
        if !is_stray(doc, child) {
            continue;
        }
        if doc.tag_name(child).map(is_head_element).unwrap_or(false) {
            doc.append_child(head, child)?;
        } else if before_body {
            doc.insert_child(body, index, child)?;
            index += 1;
        } else {
            doc.append_child(body, child)?;
        }
        changed = true;
    }

    if changed {
        debug!("repaired document shell");
    }
    Ok(changed)
}

fn direct_child(doc: &MarkupDocument, parent: NodeId, name: &str) -> Option<NodeId> {
    doc.element_children(parent)
        .into_iter()
        .find(|id| doc.is_element(*id, name))
}

/// Content nodes that sit outside the place they belong.
fn is_stray(doc: &MarkupDocument, id: NodeId) -> bool {
    match doc.kind(id) {
        Some(NodeKind::Element(_)) => true,
        Some(NodeKind::Text(raw)) => !raw.trim().is_empty(),
        Some(NodeKind::CData(_)) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repaired(input: &str) -> String {
        let mut doc = MarkupDocument::parse(input);
        ensure_shell(&mut doc).unwrap();
        doc.serialize()
    }

    #[test]
    fn test_fragment_gets_full_shell() {
        assert_eq!(
            repaired("<p>a</p><p>b</p>"),
            "<!DOCTYPE html><html><head></head><body><p>a</p><p>b</p></body></html>"
        );
    }

    #[test]
    fn test_head_elements_move_to_head() {
        assert_eq!(
            repaired("<style>p{}</style><p>a</p>"),
            "<!DOCTYPE html><html><head><style>p{}</style></head><body><p>a</p></body></html>"
        );
    }

    #[test]
    fn test_html_without_body() {
        assert_eq!(
            repaired("<html><head><title>t</title></head><p>x</p></html>"),
            "<!DOCTYPE html><html><head><title>t</title></head><body><p>x</p></body></html>"
        );
    }

    #[test]
    fn test_stray_before_and_after_html() {
        assert_eq!(
            repaired("lead<html><body><p>x</p></body></html><p>tail</p>"),
            "<!DOCTYPE html><html><head></head><body>lead<p>x</p><p>tail</p></body></html>"
        );
    }

    #[test]
    fn test_complete_document_is_untouched() {
        let input = "<!DOCTYPE html><html><head></head><body><p>x</p></body></html>";
        let mut doc = MarkupDocument::parse(input);
        assert!(!ensure_shell(&mut doc).unwrap());
        assert_eq!(doc.serialize(), input);
    }

    #[test]
    fn test_repair_is_idempotent() {
        let once = repaired("<div>loose <b>text");
        assert_eq!(repaired(&once), once);
    }
}
