//! Small helpers shared across the rewriting modules.
use std::sync::LazyLock;

use kuchikikiki::NodeRef;
use markup5ever::local_name;
use regex::Regex;

/// Create a regex that never matches anything.
///
/// Used as a fallback when a pattern fails to compile, so a broken keyword
/// degrades to "no match" instead of a panic.
#[must_use]
#[allow(
  clippy::expect_used,
  reason = "This pattern is guaranteed to be valid"
)]
pub fn never_matching_regex() -> Regex {
  // An empty character class, asserts something impossible
  Regex::new(r"[^\s\S]")
    .expect("regex pattern [^\\s\\S] should always compile")
}

/// Strip anything that looks like an HTML tag.
#[must_use]
pub fn strip_tags(text: &str) -> String {
  static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[^>]*>").unwrap_or_else(|e| {
      log::error!(
        "Failed to compile TAG_RE regex: {e}\n Falling back to never matching \
         regex."
      );
      never_matching_regex()
    })
  });

  TAG_RE.replace_all(text, "").into_owned()
}

/// Sanitize a configuration key: lowercase, keep only `[a-z0-9_-]`.
#[must_use]
pub fn sanitize_key(key: &str) -> String {
  key
    .to_lowercase()
    .chars()
    .filter(|c| {
      c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'
    })
    .collect()
}

/// Local tag name of an element node, `None` for every other node kind.
#[must_use]
pub fn tag_name(node: &NodeRef) -> Option<String> {
  node
    .as_element()
    .map(|element| element.name.local.to_string())
}

/// Whether an element carries `class` in its class list.
#[must_use]
pub fn has_class(node: &NodeRef, class: &str) -> bool {
  node.as_element().is_some_and(|element| {
    element
      .attributes
      .borrow()
      .get(local_name!("class"))
      .is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
  })
}
