//! Injection budget planning.
//!
//! Given how many candidates a keyword has and how much budget is left, decide
//! which candidates get a link. When the budget is smaller than the candidate
//! count the chosen indices are spread evenly across the document instead of
//! clustering at the top.
use std::collections::BTreeSet;

/// Which candidates of one keyword may receive a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  /// Every candidate, in document order.
  All,
  /// Only these 0-based candidate indices.
  Indices(BTreeSet<usize>),
}

impl Selection {
  /// Whether the candidate at `index` is selected.
  #[must_use]
  pub fn contains(&self, index: usize) -> bool {
    match self {
      Self::All => true,
      Self::Indices(indices) => indices.contains(&index),
    }
  }

  /// Whether nothing at all is selected.
  #[must_use]
  pub fn is_empty(&self) -> bool {
    matches!(self, Self::Indices(indices) if indices.is_empty())
  }
}

/// Plan the replacements for one keyword.
///
/// Limits use `0` for "no cap". A `per_keyword_limit` of `0` under an active
/// `global_max` is planned as if the limit were the candidate count.
///
/// The global max is checked again by the engine before every replacement;
/// the plan only shapes the distribution.
#[must_use]
pub fn plan(
  candidate_count: usize,
  per_keyword_limit: usize,
  global_max: usize,
  already_injected: usize,
) -> Selection {
  let globally_constrained =
    global_max > 0 && candidate_count + already_injected > global_max;

  if per_keyword_limit == 0 && !globally_constrained {
    return Selection::All;
  }

  let mut effective_limit = if per_keyword_limit == 0 {
    candidate_count
  } else {
    per_keyword_limit
  };
  if globally_constrained {
    effective_limit =
      effective_limit.min(global_max.saturating_sub(already_injected));
  }

  if effective_limit == 0 {
    return Selection::Indices(BTreeSet::new());
  }
  if candidate_count <= effective_limit {
    return Selection::All;
  }

  let step = candidate_count / effective_limit;
  Selection::Indices((0..effective_limit).map(|i| i * step).collect())
}
