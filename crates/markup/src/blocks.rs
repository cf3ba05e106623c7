/// Element classification shared by the parser, the segmenter and the editor.

/// Elements that never have content or an end tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Elements whose content is raw text rather than markup.
pub const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements that belong in `<head>` when found at the top level.
pub const HEAD_ELEMENTS: &[&str] = &["base", "link", "meta", "style", "title"];

/// Elements excluded from editing and from paragraph segmentation.
pub const NON_CONTENT_ELEMENTS: &[&str] = &["head", "script", "style", "template", "noscript"];

/// Blocks that always form one paragraph unit.
pub const PARAGRAPH_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "pre", "blockquote", "dt", "dd",
    "figcaption", "caption", "address",
];

/// Generic containers that form a paragraph only when they hold text directly.
pub const CONTAINER_ELEMENTS: &[&str] = &[
    "div", "section", "article", "aside", "header", "footer", "main", "nav", "figure",
];

/// Everything laid out as a block.
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "caption",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

/// Units that structural mode lets the user select and delete.
pub const STRUCTURAL_ELEMENTS: &[&str] = &[
    "a",
    "article",
    "aside",
    "blockquote",
    "div",
    "dl",
    "figure",
    "footer",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "img",
    "li",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tr",
    "ul",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn is_raw_text(name: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&name)
}

pub fn is_head_element(name: &str) -> bool {
    HEAD_ELEMENTS.contains(&name)
}

pub fn is_non_content(name: &str) -> bool {
    NON_CONTENT_ELEMENTS.contains(&name)
}

pub fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

pub fn is_paragraph_element(name: &str) -> bool {
    PARAGRAPH_ELEMENTS.contains(&name)
}

pub fn is_container(name: &str) -> bool {
    CONTAINER_ELEMENTS.contains(&name)
}

pub fn is_structural(name: &str) -> bool {
    STRUCTURAL_ELEMENTS.contains(&name)
}

/// Whether an open element is closed implicitly when `incoming` starts,
/// following the usual HTML optional end tag rules.
pub(crate) fn closes_implicitly(open: &str, incoming: &str) -> bool {
    match open {
        "p" => is_block(incoming),
        "li" => incoming == "li",
        "dt" | "dd" => matches!(incoming, "dt" | "dd"),
        "td" | "th" => matches!(incoming, "td" | "th" | "tr"),
        "tr" => incoming == "tr",
        "option" => incoming == "option",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_close_rules() {
        assert!(closes_implicitly("p", "div"));
        assert!(closes_implicitly("p", "p"));
        assert!(!closes_implicitly("p", "span"));
        assert!(closes_implicitly("li", "li"));
        assert!(closes_implicitly("td", "tr"));
        assert!(!closes_implicitly("div", "p"));
    }

    #[test]
    fn test_paragraph_elements_are_blocks() {
        for name in PARAGRAPH_ELEMENTS {
            assert!(is_block(name), "{name} should be a block");
        }
    }
}
