//! Parsing of HTML markup into a tree of [`DOMElement`]s, plus the queries and rendering
//! needed to compare such trees.

#[macro_use]
mod dom;
mod document;
mod entities;
mod parsing;
mod pretty;

pub use document::document;
pub use dom::*;
pub use entities::decode as decode_entities;
pub use parsing::{fragment, parse_dom_node, ParseError};
