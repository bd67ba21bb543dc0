//! Text normalization shared by link loading and candidate matching.
//!
//! Rendered content usually carries typographic quotes while configured
//! keywords are typed with straight ones. Both sides go through the same
//! substitution so `don't` in a keyword matches `don’t` in the page.

const LEFT_SINGLE: char = '\u{2018}';
const RIGHT_SINGLE: char = '\u{2019}';
const LEFT_DOUBLE: char = '\u{201C}';
const RIGHT_DOUBLE: char = '\u{201D}';

/// Lowercase a string using full Unicode case mapping.
#[must_use]
pub fn normalize_case(text: &str) -> String {
  text.to_lowercase()
}

/// Decode escaped quotes, convert straight quotes to typographic ones and
/// decode any entities that survived.
///
/// Use this on configuration strings. Text taken from a parsed document is
/// already decoded and should go through [`typographic_quotes`] instead.
#[must_use]
pub fn normalize_quotes(text: &str) -> String {
  let decoded = html_escape::decode_html_entities(text);
  let curled = typographic_quotes(&decoded);
  html_escape::decode_html_entities(&curled).into_owned()
}

/// Replace straight quotes with their typographic equivalents.
///
/// A quote opens at the start of the text or after whitespace, an opening
/// bracket, a dash or another opening quote. Everywhere else it closes, which
/// also turns apostrophes in contractions into `’`.
///
/// Every input character maps to exactly one output character.
#[must_use]
pub fn typographic_quotes(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 8);
  let mut prev: Option<char> = None;

  for ch in text.chars() {
    let mapped = match ch {
      '\'' if opens_quote(prev) => LEFT_SINGLE,
      '\'' => RIGHT_SINGLE,
      '"' if opens_quote(prev) => LEFT_DOUBLE,
      '"' => RIGHT_DOUBLE,
      other => other,
    };
    out.push(mapped);
    prev = Some(mapped);
  }

  out
}

fn opens_quote(prev: Option<char>) -> bool {
  prev.is_none_or(|c| {
    c.is_whitespace()
      || matches!(
        c,
        '(' | '[' | '{' | '<' | '-' | '\u{2013}' | '\u{2014}' | LEFT_SINGLE
          | LEFT_DOUBLE
      )
  })
}
