//! Type definitions for the rewrite engine.
//!
//! Contains the limits and per-call context handed to the engine, the state it
//! reports back, and the [`Rewriter`] itself together with its builder.
//!
//! # Examples
//!
//! ```
//! use keylink::{LinkTable, RewriteContext, RewriteLimits, Rewriter};
//!
//! let table = LinkTable::load([("widgets", "https://example.com/widgets")]);
//! let rewriter = Rewriter::new(table, RewriteLimits {
//!   per_keyword: 1,
//!   ..Default::default()
//! });
//!
//! let html = rewriter.rewrite("<p>widgets</p>", &RewriteContext::default());
//! assert!(html.contains("<a href=\"https://example.com/widgets\""));
//! ```

use std::{
  collections::BTreeSet,
  fmt,
  sync::Arc,
};

use indexmap::IndexMap;

use crate::{replace::AttributeFilter, select::DisallowedAncestors, table::LinkTable};

/// Caps applied during one rewrite. `0` means unbounded for each field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteLimits {
  /// Links per keyword per document.
  pub per_keyword: usize,

  /// Injected links per block element.
  pub per_element: usize,

  /// Links per document across all keywords.
  pub global_max: usize,
}

/// Per-call information supplied by the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteContext {
  /// URL of the document being rendered, used to avoid self links and to
  /// tell internal from external destinations.
  pub current_url: Option<String>,

  /// Whether this render is the primary content of an eligible document.
  /// When `false` the content is returned untouched.
  pub is_eligible: bool,
}

impl Default for RewriteContext {
  fn default() -> Self {
    Self {
      current_url: None,
      is_eligible: true,
    }
  }
}

impl RewriteContext {
  /// An eligible render of the document at `url`.
  #[must_use]
  pub fn for_url(url: impl Into<String>) -> Self {
    Self {
      current_url: Some(url.into()),
      is_eligible: true,
    }
  }

  /// A render that must not be rewritten.
  #[must_use]
  pub const fn ineligible() -> Self {
    Self {
      current_url: None,
      is_eligible: false,
    }
  }

  /// Set the eligibility flag.
  #[must_use]
  pub const fn eligible(mut self, is_eligible: bool) -> Self {
    self.is_eligible = is_eligible;
    self
  }
}

/// Counters for one rewrite call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionState {
  /// Total links inserted so far.
  pub global_injected: usize,

  /// Candidate indices that received a link, per keyword, in table order.
  pub accepted: IndexMap<String, BTreeSet<usize>>,
}

impl InjectionState {
  /// Record a link inserted for `keyword` at candidate `index`.
  pub fn record(&mut self, keyword: &str, index: usize) {
    self
      .accepted
      .entry(keyword.to_string())
      .or_default()
      .insert(index);
    self.global_injected += 1;
  }

  /// Number of links inserted for `keyword`.
  #[must_use]
  pub fn injected_for(&self, keyword: &str) -> usize {
    self.accepted.get(keyword).map_or(0, BTreeSet::len)
  }
}

/// Output of [`Rewriter::rewrite_with_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
  /// The rewritten HTML, or the input when nothing was linked.
  pub html: String,

  /// What the pass did.
  pub state: InjectionState,
}

impl RewriteReport {
  pub(crate) fn unchanged(html: &str) -> Self {
    Self {
      html:  html.to_string(),
      state: InjectionState::default(),
    }
  }

  /// Whether at least one link was inserted.
  #[must_use]
  pub const fn changed(&self) -> bool {
    self.state.global_injected > 0
  }
}

/// Phases of one rewrite call, logged at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
  Idle,
  Parsing,
  PerKeywordLoop,
  Serializing,
  Done,
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Idle => "idle",
      Self::Parsing => "parsing",
      Self::PerKeywordLoop => "per-keyword loop",
      Self::Serializing => "serializing",
      Self::Done => "done",
    };
    f.write_str(name)
  }
}

/// Strategy for replacing the disallowed-ancestor list.
///
/// Receives the list in entry form (`"h2"`, `".no-links"`) and returns the
/// list to use.
pub trait DisallowedFilter: Send + Sync {
  fn filter(&self, entries: Vec<String>) -> Vec<String>;
}

impl<F> DisallowedFilter for F
where
  F: Fn(Vec<String>) -> Vec<String> + Send + Sync,
{
  fn filter(&self, entries: Vec<String>) -> Vec<String> {
    self(entries)
  }
}

/// Keyword link rewriter.
///
/// Immutable once built, so one instance can serve any number of threads.
/// Cheap to clone since hooks are held behind `Arc`.
#[derive(Clone)]
pub struct Rewriter {
  pub(crate) table:            LinkTable,
  pub(crate) limits:           RewriteLimits,
  pub(crate) disallowed:       DisallowedAncestors,
  pub(crate) link_class:       String,
  pub(crate) inline_tags:      BTreeSet<String>,
  pub(crate) attribute_filter: Option<Arc<dyn AttributeFilter>>,
}

impl fmt::Debug for Rewriter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Rewriter")
      .field("table", &self.table)
      .field("limits", &self.limits)
      .field("disallowed", &self.disallowed)
      .field("link_class", &self.link_class)
      .field("inline_tags", &self.inline_tags)
      .field("attribute_filter", &self.attribute_filter.is_some())
      .finish()
  }
}

/// Builder for constructing a [`Rewriter`] with method chaining.
#[derive(Clone)]
pub struct RewriterBuilder {
  table:             LinkTable,
  limits:            RewriteLimits,
  link_class:        String,
  exclude_class:     Option<String>,
  disallowed:        Option<Vec<String>>,
  disallowed_filter: Option<Arc<dyn DisallowedFilter>>,
  inline_tags:       Option<Vec<String>>,
  attribute_filter:  Option<Arc<dyn AttributeFilter>>,
}

impl RewriterBuilder {
  /// Create a new builder for `table` with no limits and default classes.
  #[must_use]
  pub fn new(table: LinkTable) -> Self {
    Self {
      table,
      limits: RewriteLimits::default(),
      link_class: crate::replace::DEFAULT_LINK_CLASS.to_string(),
      exclude_class: None,
      disallowed: None,
      disallowed_filter: None,
      inline_tags: None,
      attribute_filter: None,
    }
  }

  /// Set all limits at once.
  #[must_use]
  pub const fn limits(mut self, limits: RewriteLimits) -> Self {
    self.limits = limits;
    self
  }

  /// Links per keyword per document; `0` for unbounded.
  #[must_use]
  pub const fn per_keyword_limit(mut self, limit: usize) -> Self {
    self.limits.per_keyword = limit;
    self
  }

  /// Injected links per block element; `0` for unbounded.
  #[must_use]
  pub const fn per_element_limit(mut self, limit: usize) -> Self {
    self.limits.per_element = limit;
    self
  }

  /// Links per document; `0` for unbounded.
  #[must_use]
  pub const fn global_max(mut self, limit: usize) -> Self {
    self.limits.global_max = limit;
    self
  }

  /// Class put on injected anchors. Also how injected anchors are recognized
  /// for the per-element limit.
  #[must_use]
  pub fn link_class<S: Into<String>>(mut self, class: S) -> Self {
    self.link_class = class.into();
    self
  }

  /// Extra class that opts a subtree out of rewriting.
  #[must_use]
  pub fn exclude_class<S: Into<String>>(mut self, class: S) -> Self {
    self.exclude_class = Some(class.into());
    self
  }

  /// Replace the default disallowed-ancestor list.
  #[must_use]
  pub fn disallowed<I, S>(mut self, entries: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.disallowed = Some(entries.into_iter().map(Into::into).collect());
    self
  }

  /// Hook run over the disallowed-ancestor list when the rewriter is built.
  #[must_use]
  pub fn disallowed_filter<F>(mut self, filter: F) -> Self
  where
    F: DisallowedFilter + 'static,
  {
    self.disallowed_filter = Some(Arc::new(filter));
    self
  }

  /// Replace the inline tags skipped when looking for the block element of
  /// a candidate.
  #[must_use]
  pub fn inline_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.inline_tags = Some(tags.into_iter().map(Into::into).collect());
    self
  }

  /// Hook run over the attributes of every anchor before it is inserted.
  #[must_use]
  pub fn attribute_filter<F>(mut self, filter: F) -> Self
  where
    F: AttributeFilter + 'static,
  {
    self.attribute_filter = Some(Arc::new(filter));
    self
  }

  /// Build the rewriter.
  #[must_use]
  pub fn build(self) -> Rewriter {
    let mut entries = self
      .disallowed
      .unwrap_or_else(DisallowedAncestors::default_entries);
    if let Some(filter) = &self.disallowed_filter {
      entries = filter.filter(entries);
    }

    let mut disallowed = DisallowedAncestors::from_entries(&entries);
    if let Some(class) = &self.exclude_class {
      disallowed = disallowed.with_class(class);
    }

    let inline_tags = self.inline_tags.map_or_else(
      || {
        crate::replace::DEFAULT_INLINE_TAGS
          .iter()
          .map(|tag| (*tag).to_string())
          .collect()
      },
      |tags| {
        tags
          .iter()
          .map(|tag| crate::utils::sanitize_key(tag))
          .filter(|tag| !tag.is_empty())
          .collect()
      },
    );

    Rewriter {
      table: self.table,
      limits: self.limits,
      disallowed,
      link_class: self.link_class,
      inline_tags,
      attribute_filter: self.attribute_filter,
    }
  }
}
