//! Core implementation of the rewriter.
//!
//! One call parses the fragment once, runs select, plan and replace for every
//! keyword in table order, then serializes once.
use log::{debug, trace};

use super::{
  process::process_safe,
  types::{
    InjectionState,
    Phase,
    RewriteContext,
    RewriteLimits,
    RewriteReport,
    Rewriter,
    RewriterBuilder,
  },
};
use crate::{
  document::DocumentTree,
  error::{RewriteError, RewriteResult},
  origin::{comparison_url, parse_document_url},
  plan::plan,
  replace::{KeywordMatcher, Mutation, Replacer},
  select::select,
  table::LinkTable,
};

impl Rewriter {
  /// Create a rewriter with default classes and disallowed ancestors.
  #[must_use]
  pub fn new(table: LinkTable, limits: RewriteLimits) -> Self {
    RewriterBuilder::new(table).limits(limits).build()
  }

  /// Start a builder for `table`.
  #[must_use]
  pub fn builder(table: LinkTable) -> RewriterBuilder {
    RewriterBuilder::new(table)
  }

  /// The link table in priority order.
  #[must_use]
  pub const fn table(&self) -> &LinkTable {
    &self.table
  }

  #[must_use]
  pub const fn limits(&self) -> &RewriteLimits {
    &self.limits
  }

  /// The disallowed-ancestor list in entry form, after hooks.
  #[must_use]
  pub fn disallowed_entries(&self) -> Vec<String> {
    self.disallowed.entries()
  }

  /// Rewrite `html`, linking keyword occurrences.
  ///
  /// Never fails: whenever the content cannot be rewritten it is returned
  /// as given.
  ///
  /// # Arguments
  ///
  /// * `html` - The HTML fragment to rewrite
  /// * `context` - URL and eligibility of the current render
  ///
  /// # Returns
  ///
  /// The rewritten fragment
  #[must_use]
  pub fn rewrite(&self, html: &str, context: &RewriteContext) -> String {
    self.rewrite_with_report(html, context).html
  }

  /// Like [`Self::rewrite`], also reporting which candidates were linked.
  #[must_use]
  pub fn rewrite_with_report(
    &self,
    html: &str,
    context: &RewriteContext,
  ) -> RewriteReport {
    if !context.is_eligible {
      trace!("Render not eligible, content left as is");
      return RewriteReport::unchanged(html);
    }
    if html.trim().is_empty() {
      return RewriteReport::unchanged(html);
    }
    if self.table.is_empty() {
      trace!("Link table is empty, content left as is");
      return RewriteReport::unchanged(html);
    }

    process_safe(
      html,
      |content| {
        match self.run(content, context) {
          Ok(report) if report.changed() => report,
          Ok(_) => RewriteReport::unchanged(content),
          Err(e) => {
            debug!("Rewrite skipped: {e}");
            RewriteReport::unchanged(content)
          },
        }
      },
      RewriteReport::unchanged,
    )
  }

  fn run(
    &self,
    html: &str,
    context: &RewriteContext,
  ) -> RewriteResult<RewriteReport> {
    let mut phase = Phase::Idle;

    enter(&mut phase, Phase::Parsing);
    let tree = DocumentTree::parse(html)?;

    let document_url = context
      .current_url
      .as_deref()
      .and_then(parse_document_url);
    let current = context
      .current_url
      .as_deref()
      .and_then(|url| comparison_url(url, document_url.as_ref()));

    let replacer = Replacer::new(tree.root(), &self.link_class)
      .per_element_limit(self.limits.per_element)
      .inline_tags(&self.inline_tags)
      .document_url(document_url.as_ref())
      .attribute_filter(self.attribute_filter.as_deref());

    let mut state = InjectionState::default();
    enter(&mut phase, Phase::PerKeywordLoop);

    'entries: for entry in &self.table {
      if self.global_max_reached(&state) {
        trace!("Global max of {} reached", self.limits.global_max);
        break;
      }

      if current.is_some()
        && comparison_url(&entry.url, document_url.as_ref()) == current
      {
        debug!("Skipping '{}': it links to the current page", entry.keyword);
        continue;
      }

      let candidates = select(&tree, &entry.keyword, &self.disallowed);
      if candidates.is_empty() {
        continue;
      }

      let selection = plan(
        candidates.len(),
        self.limits.per_keyword,
        self.limits.global_max,
        state.global_injected,
      );
      let matcher = KeywordMatcher::new(&entry.keyword);

      let selected = candidates.iter().filter(|c| selection.contains(c.index));
      for candidate in selected {
        if self.global_max_reached(&state) {
          trace!("Global max of {} reached", self.limits.global_max);
          break 'entries;
        }

        match replacer.apply(&candidate, &matcher, &entry.url) {
          Ok(Mutation::Injected) => {
            state.record(&entry.keyword, candidate.index);
          },
          Ok(Mutation::SkippedElementLimit) => {},
          Err(RewriteError::NoMatch { .. }) => {
            trace!(
              "Candidate {} for '{}' has no whole-word match",
              candidate.index,
              entry.keyword
            );
          },
          Err(e) => return Err(e),
        }
      }

      debug!(
        "Keyword '{}': {} candidates, {} linked",
        entry.keyword,
        candidates.len(),
        state.injected_for(&entry.keyword)
      );
    }

    enter(&mut phase, Phase::Serializing);
    let html = tree.serialize()?;
    enter(&mut phase, Phase::Done);

    Ok(RewriteReport { html, state })
  }

  const fn global_max_reached(&self, state: &InjectionState) -> bool {
    self.limits.global_max > 0
      && state.global_injected >= self.limits.global_max
  }
}

fn enter(phase: &mut Phase, next: Phase) {
  trace!("Rewrite phase {phase} -> {next}");
  *phase = next;
}
