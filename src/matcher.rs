//! Structural comparison of an observed tree against an expected pattern.
//!
//! The pattern is ordinary markup with a few extra meanings:
//!
//! * an attribute value written `/regex/` must match the start of the observed value;
//! * the expected `class` tokens need only be a subset of the observed ones;
//! * a first child text starting with `...` puts that element's children in wildcard mode,
//!   where child elements are searched for anywhere below the observed element (by `id` if
//!   they have one, otherwise by tag name) and loose text tokens must appear, in order,
//!   somewhere in the observed text.
//!
//! Outside wildcard mode children are compared one to one, ignoring whitespace-only text.
//!
//! Searching by tag name retries the whole sub-match for every candidate, so in the worst case
//! a wildcard element costs the size of the observed subtree times the number of expected
//! children. Fragments are small enough that this doesn't matter.

use fancy_regex::Regex;
use html::{DOMContent, DOMElement};
use std::borrow::Cow;
use tracing::{debug, span, trace, Level};

use crate::error::MatchError;

/// Leading text that switches an element's children to wildcard mode
pub const ELLIPSIS: &str = "...";

/// Attributes holding whitespace separated token lists
const MULTI_VALUED_ATTRIBUTES: &[&str] = &[
    "class",
    "rel",
    "rev",
    "accept-charset",
    "headers",
    "accesskey",
    "dropzone",
];

/// Check that `observed` satisfies `expected`, failing at the first difference.
///
/// `wild` selects wildcard mode for the children of the top-level elements; nested
/// comparisons start out strict and only turn wild through their own `...` marker.
pub fn matches(observed: &DOMContent, expected: &DOMContent, wild: bool) -> Result<(), MatchError> {
    match (observed, expected) {
        (DOMContent::Element(o), DOMContent::Element(e)) => matches_element(o, e, wild),
        (DOMContent::Text(o), DOMContent::Text(e)) => {
            let (e, o) = (e.trim(), o.trim());
            if e != o {
                return Err(MatchError::new(
                    format!("text nodes differ {:?} != {:?}", e, o),
                    expected,
                    observed,
                ));
            }
            Ok(())
        }
        _ => Err(MatchError::new("tag names don't match", expected, observed)),
    }
}

pub fn matches_element(
    observed: &DOMElement,
    expected: &DOMElement,
    wild: bool,
) -> Result<(), MatchError> {
    let span = span!(Level::TRACE, "match_element", tag = %expected.name);
    let _enter = span.enter();
    if expected.name != observed.name {
        return Err(MatchError::new("tag names don't match", expected, observed));
    }
    match_attributes(observed, expected)?;

    let (children, wild) = pattern_children(expected, wild);
    if wild {
        match_wildcard_children(observed, expected, &children)
    } else {
        match_strict_children(observed, expected, &children)
    }
}

fn match_attributes(observed: &DOMElement, expected: &DOMElement) -> Result<(), MatchError> {
    for (name, e_val) in expected.attributes.iter() {
        let e_val = attribute_value(name, e_val);
        let o_val = match observed.get_attribute(name) {
            Some(v) => attribute_value(name, v),
            None => return Err(MatchError::new(format!("missing {}", name), expected, observed)),
        };
        if e_val == o_val {
            continue;
        }
        if let Some(pattern) = regex_constraint(&e_val) {
            let re = Regex::new(pattern).map_err(|err| {
                MatchError::new(
                    format!("attribute {} has an invalid pattern: {}", name, err),
                    expected,
                    observed,
                )
            })?;
            if matches_at_start(&re, &o_val) {
                trace!(attribute = name, pattern, "Pattern matched");
                continue;
            }
        }
        if name == "class" {
            let classes: Vec<&str> = o_val.split_whitespace().collect();
            if let Some(missing) = e_val.split_whitespace().find(|c| !classes.contains(c)) {
                return Err(MatchError::new(
                    format!("missing class: {}", missing),
                    expected,
                    observed,
                ));
            }
        } else {
            return Err(MatchError::new(
                format!("attribute {} has different values: {:?} != {:?}", name, e_val, o_val),
                expected,
                observed,
            ));
        }
    }
    Ok(())
}

/// Token list attributes compare with their tokens joined by single spaces
fn attribute_value<'a>(name: &str, value: &'a str) -> Cow<'a, str> {
    if MULTI_VALUED_ATTRIBUTES.contains(&name) {
        Cow::Owned(value.split_whitespace().collect::<Vec<_>>().join(" "))
    } else {
        Cow::Borrowed(value)
    }
}

/// The pattern inside a value of the form `/pattern/`, if it is one
fn regex_constraint(value: &str) -> Option<&str> {
    value
        .strip_prefix('/')
        .and_then(|v| v.strip_suffix('/'))
        .filter(|p| !p.is_empty())
}

/// Whether `re` matches a prefix of `haystack`. A leftmost match that doesn't start at 0
/// means no match starts there.
fn matches_at_start(re: &Regex, haystack: &str) -> bool {
    matches!(re.find(haystack), Ok(Some(m)) if m.start() == 0)
}

/// The expected children as they take part in the comparison, and the effective mode.
///
/// A leading `...` text is replaced by whatever follows the marker, which forces wildcard
/// mode. The expected tree itself is left untouched.
fn pattern_children(expected: &DOMElement, wild: bool) -> (Vec<Cow<'_, DOMContent>>, bool) {
    let mut children: Vec<Cow<DOMContent>> = expected.contents.iter().map(Cow::Borrowed).collect();
    if let Some(DOMContent::Text(text)) = expected.contents.first() {
        if text.trim_start().starts_with(ELLIPSIS) {
            if let Some((_, rest)) = text.split_once(ELLIPSIS) {
                trace!("Entering wildcard mode");
                children[0] = Cow::Owned(DOMContent::Text(rest.to_string()));
                return (children, true);
            }
        }
    }
    (children, wild)
}

fn match_strict_children(
    observed: &DOMElement,
    expected: &DOMElement,
    children: &[Cow<DOMContent>],
) -> Result<(), MatchError> {
    let enodes: Vec<&DOMContent> = children
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| c.is_significant())
        .collect();
    let onodes: Vec<&DOMContent> = observed
        .contents
        .iter()
        .filter(|c| c.is_significant())
        .collect();
    if enodes.len() != onodes.len() {
        return Err(MatchError::new(
            format!("Wrong number of children {}!={}", onodes.len(), enodes.len()),
            expected,
            observed,
        ));
    }
    for (enode, onode) in enodes.into_iter().zip(onodes) {
        match (enode, onode) {
            (DOMContent::Text(e), DOMContent::Text(o)) => {
                let (e, o) = (e.trim(), o.trim());
                if e != o {
                    return Err(MatchError::new(
                        format!("text nodes differ {:?} != {:?}", e, o),
                        expected,
                        observed,
                    ));
                }
            }
            _ => matches(onode, enode, false)?,
        }
    }
    Ok(())
}

fn match_wildcard_children(
    observed: &DOMElement,
    expected: &DOMElement,
    children: &[Cow<DOMContent>],
) -> Result<(), MatchError> {
    let mut match_text = String::new();
    for child in children {
        match child.as_ref() {
            DOMContent::Element(enode) => match enode.id() {
                Some(id) => {
                    let onode = observed.get_element_by_id(id).ok_or_else(|| {
                        MatchError::new(
                            format!("In wildcard id search, couldn't find {:?}", id),
                            enode,
                            observed,
                        )
                    })?;
                    matches_element(onode, enode, false)?;
                }
                None => find_by_name(observed, enode)?,
            },
            DOMContent::Text(text) => {
                match_text.push(' ');
                match_text.push_str(text);
            }
        }
    }

    let mut tokens = match_text.split_whitespace().peekable();
    if tokens.peek().is_none() {
        return Ok(());
    }
    let text = observed.text_content();
    let mut cursor = 0;
    for token in tokens {
        match text[cursor..].find(token) {
            Some(i) => cursor += i + token.len(),
            None => {
                return Err(MatchError::new(
                    format!("{} not found in text content.", token),
                    expected,
                    observed,
                ))
            }
        }
    }
    Ok(())
}

/// Try every same-named element below `observed` in document order, keeping the first that
/// matches `enode`
fn find_by_name(observed: &DOMElement, enode: &DOMElement) -> Result<(), MatchError> {
    let candidates = observed.get_elements_by_name(&enode.name, true);
    debug!(name = %enode.name, candidates = candidates.len(), "Wildcard search");
    for onode in &candidates {
        match matches_element(onode, enode, false) {
            Ok(()) => return Ok(()),
            // With a single candidate its own failure is the most precise answer
            Err(err) if candidates.len() == 1 => return Err(err),
            Err(err) => debug!(reason = %err.reason, "Rejected wildcard candidate"),
        }
    }
    Err(MatchError::new("Couldn't find wildcard match", enode, observed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::fragment;

    fn parse(markup: &str) -> DOMContent {
        let mut nodes = fragment(markup).unwrap();
        assert_eq!(nodes.len(), 1, "fixture should be a single node");
        nodes.remove(0)
    }

    fn check(expected: &str, observed: &str) -> Result<(), MatchError> {
        matches(&parse(observed), &parse(expected), false)
    }

    fn reason(expected: &str, observed: &str) -> String {
        check(expected, observed).unwrap_err().reason
    }

    #[test]
    fn test_tag_mismatch() {
        assert_eq!(reason("<div>x</div>", "<p>x</p>"), "tag names don't match");
        assert_eq!(reason("<div>x</div>", "<p>y</p>"), "tag names don't match");
        assert_eq!(reason("<p><b>x</b></p>", "<p>x</p>"), "tag names don't match");
        assert_eq!(reason("<p>x</p>", "<p><b>x</b></p>"), "tag names don't match");
    }

    #[test]
    fn test_text_against_text() {
        assert!(matches(&"  a b ".into(), &"a b".into(), false).is_ok());
        let err = matches(&"a  b".into(), &"a b".into(), false).unwrap_err();
        assert_eq!(err.reason, r#"text nodes differ "a b" != "a  b""#);
    }

    #[test]
    fn test_literal_attributes() {
        assert!(check(r#"<a href="/x">t</a>"#, r#"<a href="/x">t</a>"#).is_ok());
        assert_eq!(
            reason(r#"<a href="/x">t</a>"#, r#"<a href="/y">t</a>"#),
            r#"attribute href has different values: "/x" != "/y""#
        );
        assert_eq!(reason(r#"<a href="/x">t</a>"#, r#"<a>t</a>"#), "missing href");
        // Extra observed attributes are fine
        assert!(check(r#"<a href="/x">t</a>"#, r#"<a title="T" href="/x">t</a>"#).is_ok());
    }

    #[test]
    fn test_regex_attributes() {
        let pattern = r#"<a href="/^\/x/">t</a>"#;
        assert!(check(pattern, r#"<a href="/x/123">t</a>"#).is_ok());
        assert!(check(pattern, r#"<a href="/y/123">t</a>"#).is_err());
        // The pattern has to match at the start, but not the whole value
        assert!(check(r#"<a href="/\d+/">t</a>"#, r#"<a href="12ab">t</a>"#).is_ok());
        assert!(check(r#"<a href="/\d+/">t</a>"#, r#"<a href="ab12">t</a>"#).is_err());
        assert!(check(r#"<a href="/(?=x)x\d/">t</a>"#, r#"<a href="x1">t</a>"#).is_ok());
        // "//" is too short to be a pattern
        assert!(check(r#"<a href="//">t</a>"#, r#"<a href="">t</a>"#).is_err());
        assert!(reason(r#"<a href="/(/">t</a>"#, r#"<a href="(">t</a>"#)
            .starts_with("attribute href has an invalid pattern"));
    }

    #[test]
    fn test_class_subset() {
        assert!(check(r#"<div class="a">t</div>"#, r#"<div class="a b">t</div>"#).is_ok());
        assert!(check(r#"<div class="b  a">t</div>"#, r#"<div class="a b c">t</div>"#).is_ok());
        assert_eq!(
            reason(r#"<div class="a">t</div>"#, r#"<div class="b">t</div>"#),
            "missing class: a"
        );
        assert!(check(r#"<div class="/^a/">t</div>"#, r#"<div class="ab">t</div>"#).is_ok());
    }

    #[test]
    fn test_multi_valued_attributes_normalized() {
        assert!(check(r#"<a rel="nofollow  noopener">t</a>"#, r#"<a rel=" nofollow noopener">t</a>"#).is_ok());
        assert!(check(r#"<a title="a b">t</a>"#, r#"<a title="a  b">t</a>"#).is_err());
    }

    #[test]
    fn test_strict_children() {
        let pattern = "<ul><li>1</li><li>2</li></ul>";
        assert_eq!(reason(pattern, "<ul><li>1</li></ul>"), "Wrong number of children 1!=2");
        assert!(check(pattern, "<ul>\n  <li>1</li>\n  <li>2</li>\n</ul>").is_ok());
        assert!(check(pattern, "<ul><li>2</li><li>1</li></ul>").is_err());
        assert_eq!(
            reason("<p>a <b>b</b></p>", "<p>x <b>b</b></p>"),
            r#"text nodes differ "a" != "x""#
        );
    }

    #[test]
    fn test_strict_failure_reports_nested_nodes() {
        let err = check("<ul><li>1</li><li>2</li></ul>", "<ul><li>1</li><li>3</li></ul>").unwrap_err();
        assert_eq!(err.expected, parse("<li>2</li>"));
        assert_eq!(err.observed, parse("<li>3</li>"));
    }

    #[test]
    fn test_wildcard_id_search() {
        let pattern = r#"<div>...<span id="foo">v</span></div>"#;
        assert!(check(pattern, r#"<div><p>noise</p><span id="foo">v</span></div>"#).is_ok());
        assert!(check(pattern, r#"<div><p><i><span id="foo">v</span></i></p></div>"#).is_ok());
        assert_eq!(
            reason(pattern, r#"<div><span id="bar">v</span></div>"#),
            r#"In wildcard id search, couldn't find "foo""#
        );
        assert_eq!(
            reason(pattern, r#"<div><span id="foo">w</span></div>"#),
            r#"text nodes differ "v" != "w""#
        );
    }

    #[test]
    fn test_wildcard_id_match_is_strict() {
        let pattern = r#"<div>...<p id="x"><b>1</b></p></div>"#;
        assert_eq!(
            reason(pattern, r#"<div><p id="x"><i>0</i><b>1</b></p></div>"#),
            "Wrong number of children 2!=1"
        );
        let pattern = r#"<div>...<p id="x">...<b>1</b></p></div>"#;
        assert!(check(pattern, r#"<div><p id="x"><i>0</i><b>1</b></p></div>"#).is_ok());
    }

    #[test]
    fn test_wildcard_tag_search() {
        let pattern = "<div>...<span>v</span></div>";
        assert!(check(pattern, "<div><span>u</span><p><span>v</span></p></div>").is_ok());
        // One candidate: its own reason comes through
        assert_eq!(
            reason(pattern, "<div><span>u</span></div>"),
            r#"text nodes differ "v" != "u""#
        );
        // Several candidates, none matching
        assert_eq!(
            reason(pattern, "<div><span>u</span><span>w</span></div>"),
            "Couldn't find wildcard match"
        );
        assert_eq!(reason(pattern, "<div><p>v</p></div>"), "Couldn't find wildcard match");
    }

    #[test]
    fn test_wildcard_text_tokens() {
        let pattern = "<div>...hello world</div>";
        assert!(check(pattern, "<div>well, hello there <b>big</b> <i>world</i></div>").is_ok());
        assert!(check(pattern, "<div><p>hel</p>lo world</div>").is_err());
        assert_eq!(
            reason(pattern, "<div>world, hello</div>"),
            "world not found in text content."
        );
        assert_eq!(reason(pattern, "<div>hello</div>"), "world not found in text content.");
        // A token can't reuse the text another token matched
        assert!(check("<div>...ab ab</div>", "<div>ab</div>").is_err());
        assert!(check("<div>...ab ab</div>", "<div>abab</div>").is_ok());
    }

    #[test]
    fn test_wildcard_text_around_elements() {
        let pattern = "<div>\n  ...\n  start <b>x</b> end\n</div>";
        assert!(check(pattern, "<div>start <i>1</i><b>x</b> middle end</div>").is_ok());
        assert_eq!(
            reason(pattern, "<div>end <b>x</b> start</div>"),
            "end not found in text content."
        );
    }

    #[test]
    fn test_marker_only_on_first_child() {
        assert!(check("<div><b>x</b>...</div>", "<div><b>x</b>...</div>").is_ok());
        assert_eq!(
            reason("<div><b>x</b>...</div>", "<div><i>y</i><b>x</b>...</div>"),
            "Wrong number of children 3!=2"
        );
    }

    #[test]
    fn test_pattern_tree_untouched() {
        let expected = parse("<div>...<b>x</b></div>");
        let observed = parse("<div><b>x</b></div>");
        let before = expected.clone();
        assert!(matches(&observed, &expected, false).is_ok());
        assert!(matches(&observed, &expected, false).is_ok());
        assert_eq!(expected, before);
    }
}
