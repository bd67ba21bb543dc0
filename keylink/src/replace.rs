//! In-place replacement of one keyword occurrence with an anchor element.
//!
//! Only the first whole-word match inside a text node is linked. The text
//! before and after the match stays in the tree as sibling text nodes, so the
//! rest of the parent element is untouched.
use std::{cell::RefCell, collections::BTreeSet, ops::Range, sync::LazyLock};

use kuchikikiki::{Attribute, ExpandedName, NodeRef};
use log::trace;
use markup5ever::{QualName, local_name, ns};
use regex::{Regex, RegexBuilder};
use url::Url;

use crate::{
  error::{RewriteError, RewriteResult},
  normalize::typographic_quotes,
  origin::is_external,
  select::Candidate,
  utils::{has_class, never_matching_regex, tag_name},
};

/// Class added to every injected anchor.
pub const DEFAULT_LINK_CLASS: &str = "keylink";

/// Inline wrappers skipped when looking for the block an injected link
/// belongs to.
pub const DEFAULT_INLINE_TAGS: &[&str] = &[
  "span", "strong", "em", "b", "i", "u", "s", "small", "mark", "abbr", "cite",
  "code", "sub", "sup", "del", "ins", "q", "time", "kbd", "var", "font",
];

// Upper bound on the upward walk, in case of pathological nesting.
const MAX_ANCESTOR_DEPTH: usize = 256;

/// Attributes of an anchor about to be inserted, in output order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkAttributes {
  pairs: Vec<(String, String)>,
}

impl LinkAttributes {
  /// Value of `name`, if set.
  #[must_use]
  pub fn get(&self, name: &str) -> Option<&str> {
    self
      .pairs
      .iter()
      .find(|(key, _)| key == name)
      .map(|(_, value)| value.as_str())
  }

  /// Set `name`, replacing an existing value in place or appending.
  pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
    let (name, value) = (name.into(), value.into());
    if let Some(slot) = self.pairs.iter_mut().find(|(key, _)| *key == name) {
      slot.1 = value;
    } else {
      self.pairs.push((name, value));
    }
  }

  /// Remove `name` and return its value.
  pub fn remove(&mut self, name: &str) -> Option<String> {
    let pos = self.pairs.iter().position(|(key, _)| key == name)?;
    Some(self.pairs.remove(pos).1)
  }

  /// Attributes in output order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .pairs
      .iter()
      .map(|(key, value)| (key.as_str(), value.as_str()))
  }

  #[must_use]
  pub const fn len(&self) -> usize {
    self.pairs.len()
  }

  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.pairs.is_empty()
  }
}

/// Strategy for adjusting anchor attributes before the element is built.
///
/// Receives the computed defaults, the destination URL and the matched text.
pub trait AttributeFilter: Send + Sync {
  fn filter(
    &self,
    attributes: LinkAttributes,
    url: &str,
    text: &str,
  ) -> LinkAttributes;
}

impl<F> AttributeFilter for F
where
  F: Fn(LinkAttributes, &str, &str) -> LinkAttributes + Send + Sync,
{
  fn filter(
    &self,
    attributes: LinkAttributes,
    url: &str,
    text: &str,
  ) -> LinkAttributes {
    self(attributes, url, text)
  }
}

/// Whole-word, case-insensitive matcher for one normalized keyword.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
  keyword: String,
  regex:   Regex,
}

impl KeywordMatcher {
  /// Compile a matcher for an already-normalized keyword.
  ///
  /// Word boundaries are only required on sides where the keyword starts or
  /// ends with a word character, so `c++` still matches in `I like c++.`.
  #[must_use]
  pub fn new(keyword: &str) -> Self {
    let starts_word = keyword.chars().next().is_some_and(is_word_char);
    let ends_word = keyword.chars().next_back().is_some_and(is_word_char);
    let pattern = format!(
      "{}{}{}",
      if starts_word { r"\b" } else { "" },
      regex::escape(keyword),
      if ends_word { r"\b" } else { "" },
    );

    let regex = RegexBuilder::new(&pattern)
      .case_insensitive(true)
      .build()
      .unwrap_or_else(|e| {
        log::error!("Failed to compile matcher for '{keyword}': {e}");
        never_matching_regex()
      });

    Self {
      keyword: keyword.to_string(),
      regex,
    }
  }

  #[must_use]
  pub fn keyword(&self) -> &str {
    &self.keyword
  }

  /// Byte range of the first whole-word match in `text`.
  ///
  /// Matching happens on the quote-normalized form of `text`; the returned
  /// range indexes the original `text`.
  #[must_use]
  pub fn find(&self, text: &str) -> Option<Range<usize>> {
    let normalized = typographic_quotes(text);
    let found = self.regex.find(&normalized)?;

    let start_char = normalized[..found.start()].chars().count();
    let len_chars = found.as_str().chars().count();

    let mut offsets = text
      .char_indices()
      .map(|(pos, _)| pos)
      .chain(std::iter::once(text.len()));
    let start = offsets.nth(start_char)?;
    let end = if len_chars == 0 {
      start
    } else {
      offsets.nth(len_chars - 1)?
    };
    Some(start..end)
  }
}

fn is_word_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_'
}

/// Outcome of applying one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
  /// An anchor was inserted.
  Injected,
  /// The enclosing block already holds its share of injected links.
  SkippedElementLimit,
}

/// Applies replacements inside one document.
pub struct Replacer<'a> {
  root:              &'a NodeRef,
  link_class:        &'a str,
  inline_tags:       Option<&'a BTreeSet<String>>,
  per_element_limit: usize,
  document_url:      Option<&'a Url>,
  attribute_filter:  Option<&'a dyn AttributeFilter>,
  injected:          RefCell<Vec<NodeRef>>,
}

impl<'a> Replacer<'a> {
  /// A replacer for the tree under `root` tagging anchors with `link_class`.
  #[must_use]
  pub const fn new(root: &'a NodeRef, link_class: &'a str) -> Self {
    Self {
      root,
      link_class,
      inline_tags: None,
      per_element_limit: 0,
      document_url: None,
      attribute_filter: None,
      injected: RefCell::new(Vec::new()),
    }
  }

  /// Cap injected links per block element; `0` disables the cap.
  #[must_use]
  pub const fn per_element_limit(mut self, limit: usize) -> Self {
    self.per_element_limit = limit;
    self
  }

  /// Override the inline tags skipped by the block-ancestor walk.
  #[must_use]
  pub const fn inline_tags(mut self, tags: &'a BTreeSet<String>) -> Self {
    self.inline_tags = Some(tags);
    self
  }

  /// URL of the document, used to tell internal from external links.
  #[must_use]
  pub const fn document_url(mut self, url: Option<&'a Url>) -> Self {
    self.document_url = url;
    self
  }

  #[must_use]
  pub fn attribute_filter(
    mut self,
    filter: Option<&'a dyn AttributeFilter>,
  ) -> Self {
    self.attribute_filter = filter;
    self
  }

  /// Link the first whole-word match of the keyword in `candidate`.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::NoMatch`] when the node is not a text node any
  /// more or no longer contains a whole-word match. The tree is untouched in
  /// that case.
  pub fn apply(
    &self,
    candidate: &Candidate,
    matcher: &KeywordMatcher,
    url: &str,
  ) -> RewriteResult<Mutation> {
    let no_match = || {
      RewriteError::NoMatch {
        keyword: matcher.keyword().to_string(),
      }
    };

    let node = &candidate.node;
    let text = node.as_text().map(|t| t.borrow().clone()).ok_or_else(no_match)?;
    let range = matcher.find(&text).ok_or_else(no_match)?;

    if self.per_element_limit > 0 {
      let block = self.block_ancestor(node);
      let existing = self.injected_links_in(&block);
      if existing >= self.per_element_limit {
        trace!(
          "Candidate {} for '{}' skipped, block already has {existing} links",
          candidate.index,
          matcher.keyword()
        );
        return Ok(Mutation::SkippedElementLimit);
      }
    }

    let (before, matched, after) =
      (&text[..range.start], &text[range.clone()], &text[range.end..]);

    let anchor = self.build_anchor(url, matched);
    self.injected.borrow_mut().push(anchor.clone());

    if !before.is_empty() {
      node.insert_before(NodeRef::new_text(before));
    }
    node.insert_before(anchor);
    if !after.is_empty() {
      node.insert_before(NodeRef::new_text(after));
    }
    node.detach();

    Ok(Mutation::Injected)
  }

  /// Default attributes for a link to `url`: `href`, then `target` and `rel`
  /// for external destinations, then the marker class.
  #[must_use]
  pub fn default_attributes(&self, url: &str) -> LinkAttributes {
    let mut attributes = LinkAttributes::default();
    attributes.set("href", url);
    if is_external(url, self.document_url) {
      attributes.set("target", "_blank");
      attributes.set("rel", "noopener");
    }
    attributes.set("class", self.link_class);
    attributes
  }

  fn build_anchor(&self, url: &str, text: &str) -> NodeRef {
    let mut attributes = self.default_attributes(url);
    if let Some(filter) = self.attribute_filter {
      attributes = filter.filter(attributes, url, text);
    }

    let attrs = attributes
      .iter()
      .filter(|(name, _)| {
        let valid = is_valid_attribute_name(name);
        if !valid {
          log::warn!("Dropping invalid link attribute name '{name}'");
        }
        valid
      })
      .map(|(name, value)| {
        (ExpandedName::new("", name.to_ascii_lowercase()), Attribute {
          prefix: None,
          value:  value.to_string(),
        })
      })
      .collect::<Vec<_>>();

    let anchor = NodeRef::new_element(
      QualName::new(None, ns!(html), local_name!("a")),
      attrs,
    );
    anchor.append(NodeRef::new_text(text));
    anchor
  }

  /// Nearest ancestor that is not an inline wrapper, bounded by the fragment
  /// root.
  fn block_ancestor(&self, node: &NodeRef) -> NodeRef {
    let mut current = node.parent();
    let mut depth = 0;

    while let Some(parent) = current {
      if parent == *self.root || depth >= MAX_ANCESTOR_DEPTH {
        return parent;
      }
      match tag_name(&parent) {
        Some(tag) if self.is_inline(&tag) => {},
        _ => return parent,
      }
      depth += 1;
      current = parent.parent();
    }

    self.root.clone()
  }

  fn is_inline(&self, tag: &str) -> bool {
    self.inline_tags.map_or_else(
      || DEFAULT_INLINE_TAGS.contains(&tag),
      |tags| tags.contains(tag),
    )
  }

  /// Links this replacer inserted under `block`, plus marker-class links
  /// left by an earlier pass. Hooks may rewrite the class of the former.
  fn injected_links_in(&self, block: &NodeRef) -> usize {
    let injected = self.injected.borrow();
    let inserted = injected
      .iter()
      .filter(|anchor| anchor.ancestors().any(|node| node == *block))
      .count();
    let earlier = block
      .descendants()
      .filter(|node| {
        tag_name(node).as_deref() == Some("a")
          && self.has_link_class(node)
          && !injected.contains(node)
      })
      .count();
    inserted + earlier
  }

  fn has_link_class(&self, node: &NodeRef) -> bool {
    let mut classes = self.link_class.split_ascii_whitespace().peekable();
    classes.peek().is_some() && classes.all(|class| has_class(node, class))
  }
}

fn is_valid_attribute_name(name: &str) -> bool {
  static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_:][-A-Za-z0-9_:.]*$").unwrap_or_else(|e| {
      log::error!(
        "Failed to compile NAME_RE regex: {e}\n Falling back to never \
         matching regex."
      );
      never_matching_regex()
    })
  });
  NAME_RE.is_match(name)
}
