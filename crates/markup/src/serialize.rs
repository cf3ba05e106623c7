use crate::{is_void, Element, MarkupDocument, NodeId, NodeKind};

impl MarkupDocument {
    /// Serializes the whole document.
    pub fn serialize(&self) -> String {
        self.inner_markup(self.root())
    }

    /// Outer markup of one node.
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    /// Markup of the children of `id`.
    pub fn inner_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(kind) = self.kind(id) else {
            return;
        };
        match kind {
            NodeKind::Document => {
                for child in self.children(id) {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Element(el) => {
                let children = self.children(id);
                write_start_tag(el, out);
                if children.is_empty() && (el.self_closing || is_void(&el.name)) {
                    return;
                }
                for child in children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
            NodeKind::Text(raw)
            | NodeKind::Comment(raw)
            | NodeKind::Doctype(raw)
            | NodeKind::Declaration(raw)
            | NodeKind::Instruction(raw)
            | NodeKind::CData(raw) => out.push_str(raw),
        }
    }
}

fn write_start_tag(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for attr in &el.attrs {
        out.push(' ');
        out.push_str(&attr.name);
        out.push('=');
        if !attr.value.contains('"') {
            out.push('"');
            out.push_str(&attr.value);
            out.push('"');
        } else if !attr.value.contains('\'') {
            out.push('\'');
            out.push_str(&attr.value);
            out.push('\'');
        } else {
            out.push('"');
            out.push_str(&attr.value.replace('"', "&quot;"));
            out.push('"');
        }
    }
    if el.self_closing && !is_void(&el.name) {
        out.push_str("/>");
    } else {
        out.push('>');
    }
}

#[cfg(test)]
mod tests {
    use crate::MarkupDocument;

    fn reserialize(input: &str) -> String {
        MarkupDocument::parse(input).serialize()
    }

    #[test]
    fn test_well_formed_input_round_trips() {
        let input = "<!DOCTYPE html><html><head><title>T &amp; U</title></head>\
                     <body><p class=\"x\">a <b>b</b></p><!-- c --><br></body></html>";
        assert_eq!(reserialize(input), input);
    }

    #[test]
    fn test_serialization_is_a_fixpoint() {
        let inputs = [
            "<p>one<p>two",
            "<div><span>open",
            "<p a=1 b='x\"y' c>t</p></i>",
            "<br/><img src=a.png/>text & more",
            "<script>a < b</script",
            "<ul><li>a<li>b</ul>",
            "a < b <p>c</p>",
        ];
        for input in inputs {
            let once = reserialize(input);
            assert_eq!(reserialize(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        assert_eq!(reserialize("<p>a<br>b</p>"), "<p>a<br>b</p>");
        assert_eq!(reserialize("<p>a<br/>b</p>"), "<p>a<br>b</p>");
        assert_eq!(reserialize("<div/>"), "<div/>");
    }

    #[test]
    fn test_single_quoted_attribute_kept_valid() {
        assert_eq!(
            reserialize("<a title='say \"hi\"'>x</a>"),
            "<a title='say \"hi\"'>x</a>"
        );
    }
}
