use lazy_static::lazy_static;
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until, take_while},
    character::complete::{char, multispace0, multispace1, satisfy},
    combinator::{map, not, opt, peek, recognize, value, verify},
    error::{Error, ErrorKind},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::trace;

use super::dom::*;
use super::entities::decode;

lazy_static! {
    /// Elements that never have contents or a closing tag
    static ref VOID_ELEMENTS: HashSet<&'static str> = [
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ]
    .into_iter()
    .collect();
    /// Elements whose contents are taken verbatim up to the closing tag
    static ref RAW_TEXT_ELEMENTS: HashSet<&'static str> = ["script", "style"].into_iter().collect();
    /// Elements whose end tag may be left out, with the start tags that close them.
    /// Any end tag belonging to an enclosing element closes them too.
    static ref IMPLIED_END: HashMap<&'static str, &'static [&'static str]> = {
        const BLOCKS: &[&str] = &[
            "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset",
            "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6",
            "header", "hgroup", "hr", "main", "menu", "nav", "ol", "p", "pre", "section",
            "table", "ul",
        ];
        const CELLS: &[&str] = &["td", "th", "tr", "thead", "tbody", "tfoot"];
        const ROW_GROUPS: &[&str] = &["tbody", "tfoot"];
        let entries: &[(&'static str, &'static [&'static str])] = &[
            ("p", BLOCKS),
            ("li", &["li"]),
            ("dt", &["dt", "dd"]),
            ("dd", &["dt", "dd"]),
            ("option", &["option", "optgroup"]),
            ("optgroup", &["optgroup"]),
            ("rt", &["rt", "rp"]),
            ("rp", &["rt", "rp"]),
            ("td", CELLS),
            ("th", CELLS),
            ("tr", &["tr", "thead", "tbody", "tfoot"]),
            ("thead", ROW_GROUPS),
            ("tbody", ROW_GROUPS),
            ("tfoot", &["tbody"]),
            ("colgroup", &["colgroup", "thead", "tbody", "tfoot", "tr"]),
        ];
        entries.iter().copied().collect()
    };
}

pub(crate) fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(name)
}

#[derive(Debug, Clone, Error, Eq, PartialEq)]
#[error("could not parse markup at byte {offset}: {context:?}")]
pub struct ParseError {
    pub offset: usize,
    pub context: String,
}

impl ParseError {
    const CONTEXT_CHARS: usize = 40;

    fn at(input: &str, remaining: &str) -> Self {
        Self {
            offset: input.len() - remaining.len(),
            context: remaining.chars().take(Self::CONTEXT_CHARS).collect(),
        }
    }
}

/// Parse a complete piece of markup into its top-level nodes
pub fn fragment(input: &str) -> Result<Vec<DOMContent>, ParseError> {
    let (remaining, contents) = parse_dom_node_contents("", input).map_err(|e| match e {
        nom::Err::Error(e) | nom::Err::Failure(e) => ParseError::at(input, e.input),
        nom::Err::Incomplete(_) => ParseError::at(input, ""),
    })?;
    if !remaining.is_empty() {
        return Err(ParseError::at(input, remaining));
    }
    trace!(nodes = contents.len(), "Parsed fragment");
    Ok(contents)
}

/// Attempt to parse a string as a valid tag name, lower-casing it
fn parse_tag_name(input: &str) -> IResult<&str, String> {
    let (remaining, name) = recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':'),
    ))(input)?;
    Ok((remaining, name.to_ascii_lowercase()))
}

/// Parse a tag in the form `</name>`, returning `name`
fn parse_close_tag(input: &str) -> IResult<&str, String> {
    let (remaining, (_, name, _, _)) =
        tuple((tag("</"), parse_tag_name, multispace0, char('>')))(input)?;
    Ok((remaining, name))
}

/// Parse a tag in the form `<name attr=value ...>`, returning the [`DOMElement`] and whether
/// the tag closed itself with `/>`
fn parse_open_tag(input: &str) -> IResult<&str, (DOMElement, bool)> {
    let (remaining, (_, name, attrs, _, slash, _)) = tuple((
        char('<'),
        parse_tag_name,
        many0(preceded(multispace1, single_attr_parser)),
        multispace0,
        opt(char('/')),
        char('>'),
    ))(input)?;
    let mut attributes = DOMAttributes::empty();
    for (k, v) in attrs {
        attributes.insert(k.to_ascii_lowercase(), decode(v));
    }
    Ok((
        remaining,
        (DOMElement::new(name, Some(attributes), vec![]), slash.is_some()),
    ))
}

/// Parse the content between an opening and closing tag, returning the text within
fn parse_text(input: &str) -> IResult<&str, DOMContent> {
    // A '<' that can't start markup is just text
    let lone_lt = terminated(
        tag("<"),
        not(satisfy(|c| c.is_ascii_alphabetic() || "/!?".contains(c))),
    );
    let (remaining, res) = recognize(many1(alt((is_not("<"), lone_lt))))(input)?;
    Ok((remaining, DOMContent::Text(decode(res).into_owned())))
}

/// Take everything up to the closing tag of a raw text element such as `<script>`
fn parse_raw_text<'a>(name: &str, input: &'a str) -> IResult<&'a str, &'a str> {
    let close = format!("</{name}");
    match input.to_ascii_lowercase().find(&close) {
        Some(i) => Ok((&input[i..], &input[..i])),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::TakeUntil))),
    }
}

fn parse_comment(input: &str) -> IResult<&str, ()> {
    value((), delimited(tag("<!--"), take_until("-->"), tag("-->")))(input)
}

/// `<!DOCTYPE ...>` and `<?xml ...?>`, which carry nothing we keep
fn parse_declaration(input: &str) -> IResult<&str, ()> {
    value(
        (),
        tuple((alt((tag("<!"), tag("<?"))), take_until(">"), char('>'))),
    )(input)
}

/// Parse a single node. Comments and declarations are consumed but produce nothing.
fn parse_node(input: &str) -> IResult<&str, Option<DOMContent>> {
    alt((
        map(parse_comment, |_| None),
        map(parse_declaration, |_| None),
        map(parse_dom_node, |e| Some(e.into())),
        map(parse_text, Some),
    ))(input)
}

/// Parse the content between an opening and closing tag, returning the list of [`DOMContent`]'s within.
/// Stops early at a start tag that implicitly ends `parent`.
fn parse_dom_node_contents<'a>(parent: &str, input: &'a str) -> IResult<&'a str, Vec<DOMContent>> {
    let (remaining, nodes) = many0(preceded(
        not(|i: &'a str| parse_implied_end(parent, i)),
        parse_node,
    ))(input)?;
    Ok((remaining, nodes.into_iter().flatten().collect()))
}

/// Succeed without consuming anything if `input` starts with a tag that closes an open
/// `parent` whose end tag was left out
fn parse_implied_end<'a>(parent: &str, input: &'a str) -> IResult<&'a str, ()> {
    let closers = match IMPLIED_END.get(parent) {
        Some(closers) => *closers,
        None => return Err(nom::Err::Error(Error::new(input, ErrorKind::Verify))),
    };
    value(
        (),
        verify(peek(preceded(char('<'), parse_tag_name)), |name: &String| {
            closers.contains(&name.as_str())
        }),
    )(input)
}

fn has_optional_end_tag(name: &str) -> bool {
    IMPLIED_END.contains_key(name)
}

/// Parse a complete DOM tag, returning the [`DOMElement`]
pub fn parse_dom_node(input: &str) -> IResult<&str, DOMElement> {
    let (rest, (mut open, self_closing)) = parse_open_tag(input)?;
    if self_closing || is_void_element(&open.name) {
        return Ok((rest, open));
    }
    let (rest, contents) = if RAW_TEXT_ELEMENTS.contains(open.name.as_str()) {
        let (rest, text) = parse_raw_text(&open.name, rest)?;
        let contents = if text.is_empty() {
            vec![]
        } else {
            vec![DOMContent::Text(text.to_string())]
        };
        (rest, contents)
    } else {
        parse_dom_node_contents(&open.name, rest)?
    };
    let remaining = match parse_close_tag(rest) {
        Ok((remaining, close)) if close == open.name => remaining,
        // Leave whatever follows to the enclosing element
        _ if has_optional_end_tag(&open.name) => {
            trace!(tag = %open.name, "Implied end tag");
            rest
        }
        Ok(_) => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Verify))),
        Err(e) => return Err(e),
    };
    open.contents = contents;
    Ok((remaining, open))
}

#[cfg(test)]
#[test]
fn test_node_parse() {
    let data = r#"<html><div class=nothing><h1></h1></div></html>"#;
    let target = DOMElement::new(
        "html",
        None,
        vec![DOMElement::new(
            "div",
            Some(attributes!("class" => "nothing")),
            vec![DOMElement::new("h1", None, vec![]).into()],
        )
        .into()],
    );
    assert_eq!(parse_dom_node(data).unwrap(), ("", target));

    let data = r#"<HTML><h1>Hello, world</H1></html>"#;
    let target = DOMElement::new(
        "html",
        None,
        vec![DOMElement::new("h1", None, vec!["Hello, world".into()]).into()],
    );
    assert_eq!(parse_dom_node(data).unwrap(), ("", target));
}

#[cfg(test)]
#[test]
fn test_parse_malformed() {
    let data = r#"<html></closing><opening></html>"#;
    assert!(parse_dom_node(data).is_err());
    let data = r#"<---></--->"#;
    assert!(parse_dom_node(data).is_err());
    assert_eq!(
        fragment("<div><span>a</div>"),
        Err(ParseError {
            offset: 0,
            context: "<div><span>a</div>".to_string()
        })
    );
    // An optional end tag can only be left out, not mismatched
    assert!(fragment("<ul><li>a</ul></li>").is_err());
    assert_eq!(fragment("x</p>").map_err(|e| e.offset), Err(1));
}

#[cfg(test)]
#[test]
fn test_tag_parse() {
    let data = r#"<div>"#;
    let target = DOMElement::new("div", None, vec![]);
    assert_eq!(parse_open_tag(data).unwrap(), ("", (target, false)));

    let data = r#"<div attr1 attr2=two attr3='three' ATTR4="number four">"#;
    let target = DOMElement::new(
        "div",
        Some(attributes!(
            "attr1" => "",
            "attr2" => "two",
            "attr3" => "three",
            "attr4" => "number four",
        )),
        vec![],
    );
    assert_eq!(parse_open_tag(data).unwrap(), ("", (target, false)));

    let data = r#"<a href="/^\/x/" title = 'a &amp; b' />"#;
    let target = DOMElement::new(
        "a",
        Some(attributes!("href" => r"/^\/x/", "title" => "a & b")),
        vec![],
    );
    assert_eq!(parse_open_tag(data).unwrap(), ("", (target, true)));
}

#[cfg(test)]
#[test]
fn test_void_and_raw_text() {
    let data = r#"<p>a<br>b<img src=x.png></p>"#;
    let (_, p) = parse_dom_node(data).unwrap();
    assert_eq!(p.contents.len(), 4);

    let data = r#"<script>if (a < b) { x("</p>") }</SCRIPT>"#;
    let (_, script) = parse_dom_node(data).unwrap();
    assert_eq!(
        script.contents,
        vec![DOMContent::from(r#"if (a < b) { x("</p>") }"#)]
    );
}

#[cfg(test)]
#[test]
fn test_text_and_comments() {
    let nodes = fragment("1 < 2 <!-- hidden --><b>&lt;ok&gt;</b>").unwrap();
    assert_eq!(
        nodes,
        vec![
            DOMContent::from("1 < 2 "),
            DOMElement::new("b", None, vec!["<ok>".into()]).into(),
        ]
    );
}

#[cfg(test)]
#[test]
fn test_implied_end_tags() {
    let li = |text: &str| DOMContent::from(DOMElement::new("li", None, vec![text.into()]));
    let (_, ul) = parse_dom_node("<ul><li>1<li>2</ul>").unwrap();
    assert_eq!(ul.contents, vec![li("1"), li("2")]);

    let (_, ul) = parse_dom_node("<ul>\n  <li>1\n  <li>2\n</ul>").unwrap();
    assert_eq!(ul.get_elements_by_name("li", false).len(), 2);

    let p = |text: &str| DOMContent::from(DOMElement::new("p", None, vec![text.into()]));
    let (_, div) = parse_dom_node("<div><p>a<p>b</div>").unwrap();
    assert_eq!(div.contents, vec![p("a"), p("b")]);

    // A block start tag closes an open paragraph, an inline one doesn't
    let nodes = fragment("<p>a<div>b</div><p>c <b>d</b>").unwrap();
    assert_eq!(
        nodes.iter().map(|n| n.name().unwrap_or("#text")).collect::<Vec<_>>(),
        ["p", "div", "p"]
    );
    assert_eq!(nodes[2].text_content(), "c  d");
}

#[cfg(test)]
#[test]
fn test_implied_end_tags_in_tables_and_lists() {
    let (_, table) = parse_dom_node("<table><tr><td>1<td>2<tr><th>3</table>").unwrap();
    let rows = table.get_elements_by_name("tr", false);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get_elements_by_name("td", false).len(), 2);
    assert_eq!(rows[1].get_elements_by_name("th", false).len(), 1);

    let (_, dl) = parse_dom_node("<dl><dt>term<dd>one<dd>two</dl>").unwrap();
    assert_eq!(
        dl.child_elements().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        ["dt", "dd", "dd"]
    );

    let (_, select) = parse_dom_node("<select><option>a<option selected>b</select>").unwrap();
    let options = select.get_elements_by_name("option", false);
    assert_eq!(options.len(), 2);
    assert_eq!(options[1].get_attribute("selected").map(String::as_str), Some(""));

    // Nested lists: the inner items end with the inner list
    let (_, ul) = parse_dom_node("<ul><li>a<ul><li>b<li>c</ul></li><li>d</ul>").unwrap();
    assert_eq!(ul.get_elements_by_name("li", false).len(), 2);
    assert_eq!(ul.get_elements_by_name("li", true).len(), 4);
}

// Attribute parsing below

fn parse_single_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('\''), map(opt(is_not("'")), Option::unwrap_or_default), char('\''))(input)
}

fn parse_double_quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), map(opt(is_not("\"")), Option::unwrap_or_default), char('"'))(input)
}

fn parse_unquoted(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'=<>`")(input)
}

fn value_parser(input: &str) -> IResult<&str, &str> {
    alt((parse_single_quoted, parse_double_quoted, parse_unquoted))(input)
}

fn name_parser(input: &str) -> IResult<&str, &str> {
    is_not(" \t\r\n\"'>/=")(input)
}

fn single_attr_parser(input: &str) -> IResult<&str, (&str, &str)> {
    let mut key_value = tuple((
        name_parser,
        delimited(multispace0, char('='), multispace0),
        value_parser,
    ));
    if let Ok((r, (k, _, v))) = key_value(input) {
        Ok((r, (k, v)))
    } else {
        let (r, res) = name_parser(input)?;
        Ok((r, (res, "")))
    }
}
