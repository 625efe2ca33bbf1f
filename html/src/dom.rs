use std::fmt::Display;

/// Name given to the synthetic root returned by [`crate::document`]
pub const DOCUMENT_NAME: &str = "#document";

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DOMElement {
    pub name: String,
    pub attributes: DOMAttributes,
    pub contents: Vec<DOMContent>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DOMContent {
    Element(DOMElement),
    Text(String),
}

/// Attributes in source order. Lookups are by exact name; the parser lower-cases names.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct DOMAttributes(pub Vec<(String, String)>);

#[macro_export]
macro_rules! attributes {
    ($($k:literal => $v:literal),* $(,)?) => {
        $crate::DOMAttributes(vec![$(($k.to_string(), $v.to_string())),*])
    };
}

impl DOMAttributes {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Adds an attribute unless one with the same name is already present
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.get(&name).is_none() {
            self.0.push((name, value.into()));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl DOMContent {
    /// The tag name of an element, `None` for text
    pub fn name(&self) -> Option<&str> {
        match self {
            DOMContent::Element(elt) => Some(elt.name.as_str()),
            DOMContent::Text(_) => None,
        }
    }

    pub fn text_content(&self) -> String {
        match self {
            DOMContent::Element(elt) => elt.text_content(),
            DOMContent::Text(t) => t.clone(),
        }
    }

    /// Whitespace-only text is insignificant; elements always count
    pub fn is_significant(&self) -> bool {
        match self {
            DOMContent::Element(_) => true,
            DOMContent::Text(t) => !t.trim().is_empty(),
        }
    }
}

impl From<DOMElement> for DOMContent {
    fn from(elt: DOMElement) -> Self {
        DOMContent::Element(elt)
    }
}

impl From<&DOMElement> for DOMContent {
    fn from(elt: &DOMElement) -> Self {
        DOMContent::Element(elt.clone())
    }
}

impl From<&DOMContent> for DOMContent {
    fn from(content: &DOMContent) -> Self {
        content.clone()
    }
}

impl From<&str> for DOMContent {
    fn from(s: &str) -> Self {
        DOMContent::Text(s.to_string())
    }
}

impl From<String> for DOMContent {
    fn from(s: String) -> Self {
        DOMContent::Text(s)
    }
}

impl DOMElement {
    pub fn new(
        name: impl Display,
        attributes: Option<DOMAttributes>,
        contents: Vec<DOMContent>,
    ) -> Self {
        Self {
            name: name.to_string(),
            attributes: attributes.unwrap_or_default(),
            contents,
        }
    }

    pub fn document(contents: Vec<DOMContent>) -> Self {
        Self::new(DOCUMENT_NAME, None, contents)
    }

    pub fn is_document(&self) -> bool {
        self.name == DOCUMENT_NAME
    }

    pub fn get_attribute(&self, name: &str) -> Option<&String> {
        self.attributes.get(name)
    }

    /// The element's `id`, treating an empty value as no id at all
    pub fn id(&self) -> Option<&str> {
        self.get_attribute("id")
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Iterate over child elements, skipping text
    pub fn child_elements(&self) -> impl Iterator<Item = &DOMElement> {
        self.contents.iter().filter_map(|c| match c {
            DOMContent::Element(elt) => Some(elt),
            DOMContent::Text(_) => None,
        })
    }

    /// Collect elements named `name` in document order. Only descendants are considered,
    /// never `self`; without `recursive` only direct children are.
    pub fn get_elements_by_name(&self, name: &str, recursive: bool) -> Vec<&DOMElement> {
        let mut found = Vec::new();
        self.collect_elements(&mut found, recursive, &|elt: &DOMElement| elt.name == name);
        found
    }

    /// Find the first descendant, in document order, whose `id` is exactly `id`
    pub fn get_element_by_id(&self, id: &str) -> Option<&DOMElement> {
        for child in self.child_elements() {
            if child.get_attribute("id").map(String::as_str) == Some(id) {
                return Some(child);
            }
            if let Some(found) = child.get_element_by_id(id) {
                return Some(found);
            }
        }
        None
    }

    fn collect_elements<'a>(
        &'a self,
        found: &mut Vec<&'a DOMElement>,
        recursive: bool,
        pred: &dyn Fn(&DOMElement) -> bool,
    ) {
        for child in self.child_elements() {
            if pred(child) {
                found.push(child);
            }
            if recursive {
                child.collect_elements(found, recursive, pred);
            }
        }
    }

    /// All descendant text, each child's text joined with a single space
    pub fn text_content(&self) -> String {
        self.contents
            .iter()
            .map(DOMContent::text_content)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Replace the first descendant element named `name` by its own contents.
    /// Returns whether such an element was found.
    pub fn unwrap_first(&mut self, name: &str) -> bool {
        self.edit_first(name, &mut |contents: &mut Vec<DOMContent>, i: usize| {
            if let DOMContent::Element(elt) = contents.remove(i) {
                let tail = contents.split_off(i);
                contents.extend(elt.contents);
                contents.extend(tail);
            }
        })
    }

    /// Remove the first descendant element named `name` along with its subtree
    pub fn remove_first(&mut self, name: &str) -> bool {
        self.edit_first(name, &mut |contents: &mut Vec<DOMContent>, i: usize| {
            contents.remove(i);
        })
    }

    fn edit_first(&mut self, name: &str, edit: &mut dyn FnMut(&mut Vec<DOMContent>, usize)) -> bool {
        for i in 0..self.contents.len() {
            if matches!(&self.contents[i], DOMContent::Element(elt) if elt.name == name) {
                edit(&mut self.contents, i);
                return true;
            }
            if let DOMContent::Element(elt) = &mut self.contents[i] {
                if elt.edit_first(name, edit) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
#[test]
fn test_queries() {
    let tree = DOMElement::new(
        "div",
        None,
        vec![
            DOMElement::new("span", Some(attributes!("id" => "a")), vec!["one".into()]).into(),
            DOMElement::new(
                "p",
                None,
                vec![DOMElement::new("span", Some(attributes!("id" => "b")), vec!["two".into()]).into()],
            )
            .into(),
        ],
    );
    let spans = tree.get_elements_by_name("span", true);
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[1].id(), Some("b"));
    assert_eq!(tree.get_elements_by_name("span", false).len(), 1);
    assert!(tree.get_elements_by_name("div", true).is_empty());
    assert_eq!(tree.get_element_by_id("b").map(|e| e.name.as_str()), Some("span"));
    assert!(tree.get_element_by_id("c").is_none());
    assert_eq!(tree.text_content(), "one two");
}

#[cfg(test)]
#[test]
fn test_unwrap_and_remove() {
    let mut tree = DOMElement::document(vec![DOMElement::new(
        "html",
        None,
        vec![
            DOMElement::new("head", None, vec![]).into(),
            DOMElement::new("body", None, vec!["x".into(), DOMElement::new("b", None, vec![]).into()]).into(),
        ],
    )
    .into()]);
    assert!(tree.remove_first("head"));
    assert!(tree.unwrap_first("body"));
    assert!(tree.unwrap_first("html"));
    assert!(!tree.unwrap_first("html"));
    assert_eq!(
        tree.contents,
        vec![DOMContent::from("x"), DOMElement::new("b", None, vec![]).into()]
    );
}
