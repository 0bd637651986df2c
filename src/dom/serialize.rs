use super::node::{NodeKind, NodeRef};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

// Children of these are written verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe", "noembed", "noframes", "plaintext", "script", "style", "xmp",
];

impl NodeRef {
    /// Serialized markup of this node's children.
    #[must_use]
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.data().children {
            write_node(child, &mut out);
        }
        out
    }

    /// Serialized markup of this node. Fragments serialize their children.
    #[must_use]
    pub fn outer_html(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }

    /// Rendered text: descendant text with `<br>` as a newline, skipping
    /// comments, scripts and styles.
    #[must_use]
    pub fn inner_text(&self) -> String {
        let mut out = String::new();
        write_text(self, &mut out);
        out
    }
}

fn write_node(node: &NodeRef, out: &mut String) {
    let data = node.data();
    match &data.kind {
        NodeKind::Element {
            local_name,
            attributes,
        } => {
            out.push('<');
            out.push_str(local_name);
            for attr in attributes {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                escape_into(&attr.value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&local_name.as_str()) {
                return;
            }
            for child in &data.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(local_name);
            out.push('>');
        }
        NodeKind::Text(text) if in_raw_text_element(node) => out.push_str(text),
        NodeKind::Text(text) => escape_into(text, false, out),
        NodeKind::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeKind::Fragment => {
            for child in &data.children {
                write_node(child, out);
            }
        }
    }
}

fn in_raw_text_element(node: &NodeRef) -> bool {
    node.parent()
        .and_then(|parent| parent.tag_name())
        .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag.as_str()))
}

fn write_text(node: &NodeRef, out: &mut String) {
    let data = node.data();
    match &data.kind {
        NodeKind::Text(text) => out.push_str(text),
        NodeKind::Comment(_) => {}
        NodeKind::Element { local_name, .. } => match local_name.as_str() {
            "br" => out.push('\n'),
            "script" | "style" => {}
            _ => {
                for child in &data.children {
                    write_text(child, out);
                }
            }
        },
        NodeKind::Fragment => {
            for child in &data.children {
                write_text(child, out);
            }
        }
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}
