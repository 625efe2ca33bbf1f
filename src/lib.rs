//! Structural, pattern tolerant comparison of HTML fragments.
//!
//! An expected fragment is markup that may use a few wildcards: `/regex/` attribute values,
//! partial `class` lists, and a leading `...` that lets an element's children be found
//! anywhere below the observed element. See [`matcher`] for the exact rules.

pub mod checker;
pub mod error;
pub mod matcher;

pub use checker::{ExactChecker, HtmlChecker, OutputChecker};
pub use error::{CheckError, MatchError};
pub use matcher::matches;

/// Check that the markup `observed` satisfies the pattern `expected`
pub fn compare(expected: &str, observed: &str) -> Result<(), CheckError> {
    HtmlChecker::new().check(expected, observed)
}

pub fn is_match(expected: &str, observed: &str) -> bool {
    compare(expected, observed).is_ok()
}

/// The failure report for `observed` against `expected`, or an empty string if it matches
pub fn difference(expected: &str, observed: &str) -> String {
    match compare(expected, observed) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}
