//! Candidate text node selection.
//!
//! A candidate is a text node that contains the keyword (case-insensitively,
//! after quote normalization) and sits outside every disallowed ancestor:
//! headings, existing links, form controls, quotes, figures and anything
//! carrying the exclude class.
use std::collections::BTreeSet;

use kuchikikiki::NodeRef;

use crate::{
  document::DocumentTree,
  normalize::typographic_quotes,
  utils::{has_class, sanitize_key, tag_name},
};

/// Default disallowed ancestor tags.
pub const DEFAULT_DISALLOWED_TAGS: &[&str] = &[
  "h1",
  "h2",
  "h3",
  "h4",
  "h5",
  "h6",
  "a",
  "blockquote",
  "button",
  "figcaption",
  "figure",
  "input",
  "select",
  "submit",
  "textarea",
];

/// Class that opts an element and its subtree out of rewriting.
pub const DEFAULT_EXCLUDE_CLASS: &str = "keylink-exclude";

// Their contents are not document text, so they are never searched no matter
// what the configured list says.
const RAW_TEXT_TAGS: &[&str] = &[
  "script", "style", "template", "noscript", "textarea", "title", "xmp",
  "iframe", "noembed", "noframes", "plaintext",
];

/// Tags and classes whose descendants are never rewritten.
///
/// In list form a class is written with a leading dot (`.no-links`),
/// everything else is a tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisallowedAncestors {
  tags:    BTreeSet<String>,
  classes: BTreeSet<String>,
}

impl Default for DisallowedAncestors {
  fn default() -> Self {
    Self::from_entries(Self::default_entries())
  }
}

impl DisallowedAncestors {
  /// The default list in entry form, exclude class included.
  #[must_use]
  pub fn default_entries() -> Vec<String> {
    DEFAULT_DISALLOWED_TAGS
      .iter()
      .map(|tag| (*tag).to_string())
      .chain(std::iter::once(format!(".{DEFAULT_EXCLUDE_CLASS}")))
      .collect()
  }

  /// Build from entries such as `["h2", "a", ".no-links"]`.
  ///
  /// Entries are sanitized and deduplicated; entries that sanitize to nothing
  /// are ignored.
  pub fn from_entries<I, S>(entries: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let mut tags = BTreeSet::new();
    let mut classes = BTreeSet::new();

    for entry in entries {
      let entry = entry.as_ref().trim();
      if let Some(class) = entry.strip_prefix('.') {
        let class = sanitize_class(class);
        if !class.is_empty() {
          classes.insert(class);
        }
      } else {
        let tag = sanitize_key(entry);
        if !tag.is_empty() {
          tags.insert(tag);
        }
      }
    }

    Self { tags, classes }
  }

  /// Back to entry form, tags first.
  #[must_use]
  pub fn entries(&self) -> Vec<String> {
    self
      .tags
      .iter()
      .cloned()
      .chain(self.classes.iter().map(|class| format!(".{class}")))
      .collect()
  }

  /// Also exclude elements carrying `class`.
  #[must_use]
  pub fn with_class(mut self, class: &str) -> Self {
    let class = sanitize_class(class);
    if !class.is_empty() {
      self.classes.insert(class);
    }
    self
  }

  /// Whether this single element is disallowed.
  #[must_use]
  pub fn matches(&self, element: &NodeRef) -> bool {
    let Some(tag) = tag_name(element) else {
      return false;
    };
    RAW_TEXT_TAGS.contains(&tag.as_str())
      || self.tags.contains(&tag)
      || self.classes.iter().any(|class| has_class(element, class))
  }

  /// Whether any ancestor of `node` is disallowed.
  #[must_use]
  pub fn excludes(&self, node: &NodeRef) -> bool {
    node.ancestors().any(|ancestor| self.matches(&ancestor))
  }
}

fn sanitize_class(class: &str) -> String {
  class
    .trim()
    .chars()
    .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
    .collect()
}

/// One text node found for a keyword, with its position among the
/// candidates for that keyword.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub node:  NodeRef,
  pub index: usize,
}

/// Snapshot of candidate nodes for one keyword, in document order.
///
/// Collected before any replacement for the keyword, since replacing a node
/// changes its siblings. Iterating does not consume the snapshot.
#[derive(Debug, Clone, Default)]
pub struct Candidates {
  nodes: Vec<NodeRef>,
}

impl Candidates {
  #[must_use]
  pub const fn len(&self) -> usize {
    self.nodes.len()
  }

  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Walk the candidates in document order. Can be called any number of
  /// times.
  pub fn iter(&self) -> impl Iterator<Item = Candidate> + '_ {
    self
      .nodes
      .iter()
      .enumerate()
      .map(|(index, node)| Candidate { node: node.clone(), index })
  }
}

/// Find every text node that contains `keyword` and is not inside a
/// disallowed ancestor.
///
/// `keyword` must already be normalized (see [`crate::LinkTable`]).
#[must_use]
pub fn select(
  tree: &DocumentTree,
  keyword: &str,
  disallowed: &DisallowedAncestors,
) -> Candidates {
  if keyword.is_empty() {
    return Candidates::default();
  }

  let nodes = tree
    .root()
    .descendants()
    .filter(|node| text_contains(node, keyword))
    .filter(|node| !disallowed.excludes(node))
    .collect();

  Candidates { nodes }
}

/// Whether a text node contains `keyword` once quotes are normalized.
fn text_contains(node: &NodeRef, keyword: &str) -> bool {
  node.as_text().is_some_and(|text| {
    typographic_quotes(&text.borrow())
      .to_lowercase()
      .contains(keyword)
  })
}
