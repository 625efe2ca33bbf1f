use std::borrow::Cow;

/// Replace character references (`&amp;`, `&eacute;`, `&#39;`, `&#x27;`) with the characters
/// they name. Unknown references are left as written.
pub fn decode(input: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(input)
}

pub fn escape_text(input: &str) -> Cow<'_, str> {
    html_escape::encode_text(input)
}

pub fn escape_attribute(input: &str) -> Cow<'_, str> {
    html_escape::encode_double_quoted_attribute(input)
}

#[cfg(test)]
#[test]
fn test_decode() {
    assert_eq!(decode("plain"), "plain");
    assert_eq!(decode("a &amp; b &lt;c&gt;"), "a & b <c>");
    assert_eq!(decode("&#39;&#x41;"), "'A");
    assert_eq!(decode("caf&eacute; it&rsquo;s &hellip;"), "café it\u{2019}s \u{2026}");
    assert_eq!(decode("AT&T &bogus;"), "AT&T &bogus;");
}

#[cfg(test)]
#[test]
fn test_escape() {
    assert_eq!(escape_text("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
}
