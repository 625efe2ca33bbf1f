use html::{document, DOMContent, DOMElement, ParseError};
use tracing::{debug, span, Level};

use crate::error::CheckError;
use crate::matcher::matches;

/// Decides whether the output of an example is what the example said it would be
pub trait OutputChecker {
    fn check_output(&self, want: &str, got: &str) -> bool;

    /// Explain a failed [`OutputChecker::check_output`]; empty when there is nothing to explain
    fn output_difference(&self, want: &str, got: &str) -> String;
}

/// Byte-for-byte comparison, used for anything that isn't markup
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactChecker;

impl OutputChecker for ExactChecker {
    fn check_output(&self, want: &str, got: &str) -> bool {
        want == got
    }

    fn output_difference(&self, want: &str, got: &str) -> String {
        if want == got {
            return String::new();
        }
        format!("Expected:\n{}Got:\n{}", indent(want), indent(got))
    }
}

fn indent(text: &str) -> String {
    if text.is_empty() {
        return "    Nothing\n".to_string();
    }
    text.lines().map(|l| format!("    {}\n", l)).collect()
}

/// Compares markup structurally, handing everything else to a base checker.
///
/// Without a prefix, any wanted output starting with `<` is treated as markup. With one, only
/// wanted output starting with the prefix is, and the prefix is dropped before parsing.
#[derive(Debug, Default, Clone)]
pub struct HtmlChecker<B = ExactChecker> {
    base: B,
    prefix: Option<String>,
}

impl HtmlChecker {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: OutputChecker> HtmlChecker<B> {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_base<C: OutputChecker>(self, base: C) -> HtmlChecker<C> {
        HtmlChecker {
            base,
            prefix: self.prefix,
        }
    }

    /// The pattern to compare against, if `want` should be compared as markup at all
    pub fn applicable<'w>(&self, want: &'w str) -> Option<&'w str> {
        let pattern = match &self.prefix {
            Some(prefix) => want.strip_prefix(prefix.as_str()),
            None => Some(want).filter(|w| w.starts_with('<')),
        };
        pattern.filter(|p| !p.is_empty())
    }

    /// Match `got` against the pattern `want`. The top level is always compared in
    /// wildcard mode.
    pub fn check(&self, want: &str, got: &str) -> Result<(), CheckError> {
        let span = span!(Level::DEBUG, "check");
        let _enter = span.enter();
        let observed = DOMContent::from(parse(got)?);
        let expected = DOMContent::from(parse(want)?);
        let result = matches(&observed, &expected, true);
        if let Err(err) = &result {
            debug!(reason = %err.reason, "Mismatch");
        }
        Ok(result?)
    }

    /// Like [`OutputChecker::output_difference`], but with unparseable markup kept apart from
    /// a mismatch. `None` means `got` is acceptable. Output that isn't a pattern goes to the
    /// base checker.
    pub fn report(&self, want: &str, got: &str) -> Result<Option<String>, ParseError> {
        let pattern = match self.applicable(want) {
            Some(pattern) => pattern,
            None => {
                debug!("Not a pattern, using the base checker");
                if self.base.check_output(want, got) {
                    return Ok(None);
                }
                return Ok(Some(self.base.output_difference(want, got)));
            }
        };
        match self.check(pattern, got) {
            Ok(()) => Ok(None),
            Err(CheckError::Mismatch(err)) => Ok(Some(err.to_string())),
            Err(CheckError::Parse(err)) => Err(err),
        }
    }
}

impl<B: OutputChecker> OutputChecker for HtmlChecker<B> {
    fn check_output(&self, want: &str, got: &str) -> bool {
        match self.applicable(want) {
            Some(pattern) => self.check(pattern, got).is_ok(),
            None => self.base.check_output(want, got),
        }
    }

    fn output_difference(&self, want: &str, got: &str) -> String {
        match self.applicable(want) {
            Some(pattern) => match self.check(pattern, got) {
                Ok(()) => String::new(),
                Err(err) => err.to_string(),
            },
            None => self.base.output_difference(want, got),
        }
    }
}

/// Parse markup as a document, then drop whatever scaffolding the parser added that the
/// source didn't spell out
pub fn parse(markup: &str) -> Result<DOMElement, CheckError> {
    let mut doc = document(markup)?;
    let source = markup.to_ascii_lowercase();
    if !source.contains("<body") {
        doc.unwrap_first("body");
    }
    if !source.contains("<head") {
        doc.remove_first("head");
    }
    if !source.contains("<html") {
        doc.unwrap_first("html");
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::fragment;

    #[test]
    fn test_parse_strips_scaffolding() {
        let doc = parse("<p>a</p><p>b</p>").unwrap();
        assert_eq!(doc, DOMElement::document(fragment("<p>a</p><p>b</p>").unwrap()));
    }

    #[test]
    fn test_parse_keeps_written_scaffolding() {
        let doc = parse("<BODY><p>a</p></BODY>").unwrap();
        let names: Vec<_> = doc.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["body"]);

        let doc = parse("<html><p>a</p></html>").unwrap();
        let html = doc.get_elements_by_name("html", false);
        assert_eq!(html.len(), 1);
        assert_eq!(html[0].child_elements().map(|e| e.name.as_str()).collect::<Vec<_>>(), ["p"]);
    }

    #[test]
    fn test_applicable() {
        let checker = HtmlChecker::new();
        assert_eq!(checker.applicable("<p>x</p>"), Some("<p>x</p>"));
        assert_eq!(checker.applicable("plain text"), None);

        let checker = HtmlChecker::new().with_prefix("html:");
        assert_eq!(checker.applicable("html:<p>x</p>"), Some("<p>x</p>"));
        assert_eq!(checker.applicable("<p>x</p>"), None);
        assert_eq!(checker.applicable("html:"), None);
    }

    #[test]
    fn test_falls_back_to_base() {
        let checker = HtmlChecker::new();
        assert!(checker.check_output("42\n", "42\n"));
        assert!(!checker.check_output("42\n", "43\n"));
        assert_eq!(
            checker.output_difference("42\n", "43\n"),
            "Expected:\n    42\nGot:\n    43\n"
        );
    }

    #[test]
    fn test_check_output() {
        let checker = HtmlChecker::new();
        assert!(checker.check_output("<p>x</p>", "<div><p>x</p></div>"));
        assert!(!checker.check_output("<p>x</p>", "<div><p>y</p></div>"));
        assert_eq!(checker.output_difference("<p>x</p>", "<p>x</p>"), "");
    }

    #[test]
    fn test_parse_error_reported() {
        let checker = HtmlChecker::new();
        assert!(matches!(checker.check("<p>x</p>", "<p>x</div>"), Err(CheckError::Parse(_))));
        assert!(!checker.check_output("<p>x</p>", "<p>x</div>"));
    }

    #[test]
    fn test_report() {
        let checker = HtmlChecker::new().with_prefix("html:");
        assert_eq!(checker.report("html:<p>x</p>", "<p>x</p>"), Ok(None));
        let diff = checker.report("html:<p>x</p>", "<p>y</p>").unwrap().unwrap();
        assert!(diff.starts_with("text nodes differ"));
        assert!(checker.report("html:<p>x</p>", "<p>x</div>").is_err());
        // Without the prefix the text must match exactly, even if it looks like markup
        assert_eq!(checker.report("<p>x</p>", "<p>x</p>"), Ok(None));
        assert_eq!(
            checker.report("<p>x</p>", "<div><p>x</p></div>"),
            Ok(Some("Expected:\n    <p>x</p>\nGot:\n    <div><p>x</p></div>\n".to_string()))
        );
    }

    struct Never;

    impl OutputChecker for Never {
        fn check_output(&self, _want: &str, _got: &str) -> bool {
            false
        }

        fn output_difference(&self, _want: &str, _got: &str) -> String {
            "never".to_string()
        }
    }

    #[test]
    fn test_custom_base() {
        let checker = HtmlChecker::new().with_prefix("!").with_base(Never);
        assert!(!checker.check_output("x", "x"));
        assert_eq!(checker.output_difference("x", "x"), "never");
        assert!(checker.check_output("!<b>x</b>", "<b>x</b>"));
    }
}
