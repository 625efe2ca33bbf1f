use html::{DOMContent, ParseError};
use std::fmt;
use thiserror::Error;

/// The first point at which an observed tree failed to satisfy a pattern.
///
/// Both fragments are copied out of the trees being compared, so the error stays valid after
/// they are dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchError {
    pub reason: String,
    pub expected: DOMContent,
    pub observed: DOMContent,
}

impl MatchError {
    pub fn new(
        reason: impl Into<String>,
        expected: impl Into<DOMContent>,
        observed: impl Into<DOMContent>,
    ) -> Self {
        Self {
            reason: reason.into(),
            expected: expected.into(),
            observed: observed.into(),
        }
    }
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let expected = self.expected.prettify();
        let observed = self.observed.prettify();
        let out = [
            self.reason.as_str(),
            "Expected:",
            expected.as_str(),
            "Observed:",
            observed.as_str(),
        ];
        f.write_str(&out.join("\n"))
    }
}

impl std::error::Error for MatchError {}

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Mismatch(#[from] MatchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use html::DOMElement;

    #[test]
    fn test_match_error_display() {
        let err = MatchError::new(
            "tag names don't match",
            DOMElement::new("div", None, vec!["x".into()]),
            DOMElement::new("p", None, vec!["x".into()]),
        );
        assert_eq!(
            err.to_string(),
            "tag names don't match\nExpected:\n<div>\n x\n</div>\nObserved:\n<p>\n x\n</p>"
        );
    }

    #[test]
    fn test_check_error_is_transparent() {
        let err: CheckError = MatchError::new("missing href", "a", "b").into();
        assert!(err.to_string().starts_with("missing href\nExpected:"));
        let err: CheckError = html::fragment("</p>").unwrap_err().into();
        assert!(err.to_string().contains("byte 0"));
    }
}
