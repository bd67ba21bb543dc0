//! Rewrite orchestration.
//!
//! # Architecture
//!
//! - [`core`]: the rewrite pass itself
//! - [`process`]: panic containment around a pass
//! - [`types`]: limits, per-call context, reports and the builder
pub mod core;
pub mod process;
pub mod types;

pub use process::process_safe;
pub use types::{
  DisallowedFilter,
  InjectionState,
  RewriteContext,
  RewriteLimits,
  RewriteReport,
  Rewriter,
  RewriterBuilder,
};
