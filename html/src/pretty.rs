use super::dom::*;
use super::entities::{escape_attribute, escape_text};
use super::parsing::is_void_element;

impl DOMContent {
    /// Render one tag or text run per line, indenting a single space per level
    pub fn prettify(&self) -> String {
        let mut lines = Vec::new();
        write_content(self, 0, &mut lines);
        lines.join("\n")
    }
}

impl DOMElement {
    pub fn prettify(&self) -> String {
        let mut lines = Vec::new();
        write_element(self, 0, &mut lines);
        lines.join("\n")
    }
}

fn write_content(content: &DOMContent, depth: usize, lines: &mut Vec<String>) {
    match content {
        DOMContent::Element(elt) => write_element(elt, depth, lines),
        DOMContent::Text(text) => {
            let text = text.trim();
            if !text.is_empty() {
                lines.push(format!("{}{}", " ".repeat(depth), escape_text(text)));
            }
        }
    }
}

fn write_element(elt: &DOMElement, depth: usize, lines: &mut Vec<String>) {
    // The synthetic root has no markup of its own
    if elt.is_document() {
        elt.contents
            .iter()
            .for_each(|c| write_content(c, depth, lines));
        return;
    }
    let indent = " ".repeat(depth);
    let attrs: String = elt
        .attributes
        .iter()
        .map(|(k, v)| format!(" {}=\"{}\"", k, escape_attribute(v)))
        .collect();
    if elt.contents.is_empty() && is_void_element(&elt.name) {
        lines.push(format!("{}<{}{}/>", indent, elt.name, attrs));
        return;
    }
    lines.push(format!("{}<{}{}>", indent, elt.name, attrs));
    elt.contents
        .iter()
        .for_each(|c| write_content(c, depth + 1, lines));
    lines.push(format!("{}</{}>", indent, elt.name));
}
