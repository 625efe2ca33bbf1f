use std::mem;
use tracing::trace;

use super::dom::*;
use super::parsing::{fragment, ParseError};

/// Parse markup as a whole document: a [`DOCUMENT_NAME`] root holding one `html` element,
/// which in turn holds exactly one `head` and one `body`. Whichever of those the markup
/// doesn't spell out is synthesized, and loose content ends up in the `body`.
pub fn document(input: &str) -> Result<DOMElement, ParseError> {
    let contents = fragment(input)?;
    Ok(DOMElement::document(vec![build_html(contents).into()]))
}

fn build_html(contents: Vec<DOMContent>) -> DOMElement {
    let mut html = None;
    let mut stray = Vec::new();
    for node in contents {
        match node {
            DOMContent::Element(elt) if elt.name == "html" && html.is_none() => html = Some(elt),
            other => stray.push(other),
        }
    }
    let mut html = html.unwrap_or_else(|| {
        trace!("Synthesizing <html>");
        DOMElement::new("html", None, vec![])
    });

    let mut head = None;
    let mut body = None;
    let mut rest = Vec::new();
    for node in mem::take(&mut html.contents).into_iter().chain(stray) {
        match node {
            DOMContent::Element(elt) if elt.name == "head" && head.is_none() => head = Some(elt),
            DOMContent::Element(elt) if elt.name == "body" && body.is_none() => body = Some(elt),
            other => rest.push(other),
        }
    }
    let head = head.unwrap_or_else(|| DOMElement::new("head", None, vec![]));
    let body = match body {
        // Whitespace around an explicit body is formatting, not content
        Some(mut body) => {
            body.contents
                .extend(rest.into_iter().filter(DOMContent::is_significant));
            body
        }
        None => {
            trace!("Synthesizing <body>");
            DOMElement::new("body", None, rest)
        }
    };
    html.contents = vec![head.into(), body.into()];
    html
}

#[cfg(test)]
#[test]
fn test_synthesized_scaffolding() {
    let doc = document("<p>a</p> <p>b</p>").unwrap();
    let target = DOMElement::document(vec![DOMElement::new(
        "html",
        None,
        vec![
            DOMElement::new("head", None, vec![]).into(),
            DOMElement::new(
                "body",
                None,
                vec![
                    DOMElement::new("p", None, vec!["a".into()]).into(),
                    " ".into(),
                    DOMElement::new("p", None, vec!["b".into()]).into(),
                ],
            )
            .into(),
        ],
    )
    .into()]);
    assert_eq!(doc, target);
}

#[cfg(test)]
#[test]
fn test_explicit_body_reused() {
    let doc = document("<body class=main><p>a</p></body>\n").unwrap();
    let body = doc.get_elements_by_name("body", true);
    assert_eq!(body.len(), 1);
    assert_eq!(body[0].get_attribute("class").map(String::as_str), Some("main"));
    assert_eq!(body[0].contents.len(), 1);
    assert_eq!(doc.get_elements_by_name("head", true).len(), 1);
}
