use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classes::EDITOR_CLASSES;
use crate::{ensure_shell, MarkupDocument, NodeId, EDITOR_ATTRIBUTES};
use crate::{PARAGRAPH_ID_ATTR, PARAGRAPH_INDEX_ATTR};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Overrides the `<title>` of the exported document.
    pub title: Option<String>,
    /// Drops `data-paragraph-*` tags as well as editor decoration.
    pub strip_paragraph_tags: bool,
}

impl ExportOptions {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_stripped_tags(mut self) -> Self {
        self.strip_paragraph_tags = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedDocument {
    pub markup: String,
    pub file_name: String,
}

/// Removes editor-only attributes and classes from every element.
pub fn strip_editor_decoration(doc: &mut MarkupDocument, strip_paragraph_tags: bool) {
    let elements: Vec<NodeId> = doc
        .descendants(doc.root())
        .filter(|id| doc.element(*id).is_some())
        .collect();
    for id in elements {
        let Some(el) = doc.element_mut(id) else {
            continue;
        };
        for attr in EDITOR_ATTRIBUTES {
            el.remove_attr(attr);
        }
        for class in EDITOR_CLASSES {
            el.remove_class(class);
        }
        if strip_paragraph_tags {
            el.remove_attr(PARAGRAPH_INDEX_ATTR);
            el.remove_attr(PARAGRAPH_ID_ATTR);
        }
    }
}

/// Content fit for persistence: editor decoration removed, paragraph tags
/// kept so they survive save and reload.
pub fn clean_snapshot(markup: &str) -> String {
    let mut doc = MarkupDocument::parse(markup);
    strip_editor_decoration(&mut doc, false);
    doc.serialize()
}

/// Builds a standalone document from edited content. Stylesheets of
/// `original` are carried over into the exported `<head>`.
pub fn export_document(
    edited: &str,
    original: Option<&str>,
    options: &ExportOptions,
) -> ExportedDocument {
    let mut doc = MarkupDocument::parse(edited);
    strip_editor_decoration(&mut doc, options.strip_paragraph_tags);
    if let Err(err) = ensure_shell(&mut doc) {
        warn!("export shell repair failed: {}", err);
    }

    let Some(head) = doc.head() else {
        return ExportedDocument {
            markup: doc.serialize(),
            file_name: file_name_for(options.title.as_deref()),
        };
    };

    if let Some(original) = original {
        let source = MarkupDocument::parse(original);
        let present: Vec<String> = doc
            .children(head)
            .iter()
            .map(|id| doc.serialize_node(*id))
            .collect();
        let mut injected = 0;
        for sheet in stylesheets(&source) {
            if present.contains(&source.serialize_node(sheet)) {
                continue;
            }
            match doc.import_subtree(&source, sheet) {
                Ok(copy) => {
                    if doc.append_child(head, copy).is_ok() {
                        injected += 1;
                    }
                }
                Err(err) => warn!("skipping stylesheet: {}", err),
            }
        }
        debug!(injected, "reinjected original stylesheets");
    }

    if let Some(title) = &options.title {
        set_title(&mut doc, head, title);
    }

    let title = options
        .title
        .clone()
        .or_else(|| doc.find_first("title").map(|t| doc.text_content(t)));
    ExportedDocument {
        markup: doc.serialize(),
        file_name: file_name_for(title.as_deref()),
    }
}

fn stylesheets(doc: &MarkupDocument) -> Vec<NodeId> {
    doc.descendants(doc.root())
        .filter(|id| match doc.element(*id) {
            Some(el) if el.name == "style" => true,
            Some(el) if el.name == "link" => el
                .attr("rel")
                .map(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")))
                .unwrap_or(false),
            _ => false,
        })
        .collect()
}

fn set_title(doc: &mut MarkupDocument, head: NodeId, title: &str) {
    let existing = doc
        .element_children(head)
        .into_iter()
        .find(|id| doc.is_element(*id, "title"));
    let node = match existing {
        Some(node) => node,
        None => {
            let node = doc.create_element("title");
            if doc.insert_child(head, 0, node).is_err() {
                return;
            }
            node
        }
    };
    if let Err(err) = doc.set_text_content(node, title) {
        warn!("could not set title: {}", err);
    }
}

/// File name slug derived from a title.
pub fn file_name_for(title: Option<&str>) -> String {
    let mut slug = String::new();
    for c in title.unwrap_or_default().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "document.html".to_string()
    } else {
        format!("{}.html", slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_snapshot_keeps_paragraph_tags() {
        let edited = "<p data-paragraph-index=\"0\" contenteditable=\"true\" \
                      class=\"intro paragraph-highlight\">a</p>";
        assert_eq!(
            clean_snapshot(edited),
            "<p data-paragraph-index=\"0\" class=\"intro\">a</p>"
        );
    }

    #[test]
    fn test_export_reinjects_original_styles() {
        let original = "<html><head><style>p{color:red}</style>\
                        <link rel=\"stylesheet\" href=\"a.css\"><link rel=\"icon\" href=\"i.png\">\
                        </head><body><p>o</p></body></html>";
        let edited = "<p class=\"paragraph-complete\" data-paragraph-index=\"0\">t</p>";
        let out = export_document(
            edited,
            Some(original),
            &ExportOptions::default().with_title("My Doc").with_stripped_tags(),
        );
        assert_eq!(
            out.markup,
            "<!DOCTYPE html><html><head><title>My Doc</title><style>p{color:red}</style>\
             <link rel=\"stylesheet\" href=\"a.css\"></head><body><p>t</p></body></html>"
        );
        assert_eq!(out.file_name, "my-doc.html");
    }

    #[test]
    fn test_export_does_not_duplicate_styles() {
        let doc = "<html><head><style>x{}</style></head><body><p>a</p></body></html>";
        let out = export_document(doc, Some(doc), &ExportOptions::default());
        assert_eq!(out.markup.matches("<style>").count(), 1);
    }

    #[test]
    fn test_file_name_slug() {
        assert_eq!(file_name_for(Some("  Hello, World! ")), "hello-world.html");
        assert_eq!(file_name_for(Some("???")), "document.html");
        assert_eq!(file_name_for(None), "document.html");
    }
}
