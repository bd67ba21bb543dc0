//! # keylink - keyword links for rendered HTML
//!
//! Turns plain-text occurrences of configured keywords in an HTML fragment
//! into links, within per-keyword, per-element and per-document limits.
//!
//! ## Quick Start
//!
//! ```rust
//! use keylink::{LinkTable, RewriteContext, RewriteLimits, Rewriter};
//!
//! let table = LinkTable::load([("widgets", "https://example.com/widgets")]);
//! let rewriter = Rewriter::new(table, RewriteLimits::default());
//!
//! let html = rewriter.rewrite(
//!   "<p>We sell widgets and more widgets.</p>",
//!   &RewriteContext::for_url("https://example.com/blog/hello"),
//! );
//! assert_eq!(
//!   html,
//!   "<p>We sell <a href=\"https://example.com/widgets\" \
//!    class=\"keylink\">widgets</a> and more widgets.</p>"
//! );
//! ```
//!
//! ## Features
//!
//! - **Whole-word, case-insensitive matching** that treats straight and curly
//!   quotes alike
//! - **Structural exclusion** of headings, existing links, form controls,
//!   quotes, figures and anything marked `keylink-exclude`
//! - **Even distribution** of a limited number of links across the document
//! - **Self-link suppression** for keywords pointing at the current page
//! - **Error recovery**: content that cannot be rewritten is returned as is
//!
//! ## Hooks
//!
//! ```rust
//! use keylink::{LinkAttributes, LinkTable, RewriteContext, Rewriter};
//!
//! let rewriter = Rewriter::builder(LinkTable::load([("docs", "/docs")]))
//!   .per_element_limit(1)
//!   .disallowed_filter(|mut entries: Vec<String>| {
//!     entries.push("code".to_string());
//!     entries
//!   })
//!   .attribute_filter(|mut attrs: LinkAttributes, _url: &str, _text: &str| {
//!     attrs.set("data-source", "keylink");
//!     attrs
//!   })
//!   .build();
//!
//! let html = rewriter.rewrite("<p>Read the docs.</p>", &RewriteContext::default());
//! assert!(html.contains("data-source=\"keylink\""));
//! ```

pub mod document;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod origin;
pub mod plan;
pub mod replace;
pub mod select;
pub mod table;
pub mod utils;

pub use crate::{
  document::DocumentTree,
  engine::{
    DisallowedFilter,
    InjectionState,
    RewriteContext,
    RewriteLimits,
    RewriteReport,
    Rewriter,
    RewriterBuilder,
  },
  error::{RewriteError, RewriteResult},
  plan::Selection,
  replace::{AttributeFilter, LinkAttributes},
  select::{Candidate, Candidates, DisallowedAncestors},
  table::{LinkEntry, LinkTable},
};

/// Rewrite `html` with a one-off rewriter.
///
/// Convenient for single calls; build a [`Rewriter`] once when rewriting many
/// documents with the same table.
#[must_use]
pub fn rewrite(
  html: &str,
  table: LinkTable,
  limits: RewriteLimits,
  context: &RewriteContext,
) -> String {
  Rewriter::new(table, limits).rewrite(html, context)
}
