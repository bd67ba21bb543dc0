//! Immutable configuration snapshots with atomic replacement.
//!
//! Rewrites in flight keep the snapshot they started with; a reload only
//! affects rewrites that start after it.
use std::{
  path::Path,
  sync::{Arc, PoisonError, RwLock},
};

use keylink::{RewriteContext, Rewriter, RewriterBuilder};

use crate::{
  config::{Config, ConfigFilter},
  error::ConfigError,
};

/// Adds hooks to every rewriter the store builds.
pub type RewriterHook =
  dyn Fn(RewriterBuilder) -> RewriterBuilder + Send + Sync;

/// One configuration and the rewriter built from it.
#[derive(Debug)]
pub struct Snapshot {
  source:   Config,
  config:   Config,
  rewriter: Option<Rewriter>,
}

impl Snapshot {
  fn build(
    source: Config,
    filter: Option<&dyn ConfigFilter>,
    hook: Option<&RewriterHook>,
  ) -> Self {
    let config = match filter {
      Some(filter) => source.clone().apply_filter(filter),
      None => source.clone(),
    };
    let rewriter = config.rewriter_builder().map(|builder| {
      match hook {
        Some(hook) => hook(builder).build(),
        None => builder.build(),
      }
    });

    Self {
      source,
      config,
      rewriter,
    }
  }

  /// The effective configuration, after the option filter.
  #[must_use]
  pub const fn config(&self) -> &Config {
    &self.config
  }

  /// The rewriter, unless the configuration has nothing to do.
  #[must_use]
  pub const fn rewriter(&self) -> Option<&Rewriter> {
    self.rewriter.as_ref()
  }

  /// Rewrite `html` for a document of `content_type` located at
  /// `current_url`.
  ///
  /// Content types outside `singles` are returned untouched.
  #[must_use]
  pub fn rewrite(
    &self,
    html: &str,
    content_type: &str,
    current_url: Option<&str>,
  ) -> String {
    let Some(rewriter) = &self.rewriter else {
      return html.to_string();
    };

    let context = RewriteContext {
      current_url: current_url.map(str::to_string),
      is_eligible: self.config.is_eligible(content_type),
    };
    rewriter.rewrite(html, &context)
  }
}

/// Shared holder of the current [`Snapshot`].
pub struct ConfigStore {
  current: RwLock<Arc<Snapshot>>,
  filter:  Option<Arc<dyn ConfigFilter>>,
  hook:    Option<Arc<RewriterHook>>,
}

impl ConfigStore {
  /// A store for `config` without hooks.
  #[must_use]
  pub fn new(config: Config) -> Self {
    Self {
      current: RwLock::new(Arc::new(Snapshot::build(config, None, None))),
      filter:  None,
      hook:    None,
    }
  }

  /// Run every configuration through `filter` before it is used.
  #[must_use]
  pub fn with_filter<F>(mut self, filter: F) -> Self
  where
    F: ConfigFilter + 'static,
  {
    self.filter = Some(Arc::new(filter));
    self.rebuild();
    self
  }

  /// Pass every rewriter builder through `hook`, for attribute and
  /// disallowed-ancestor hooks.
  #[must_use]
  pub fn with_rewriter_hook<F>(mut self, hook: F) -> Self
  where
    F: Fn(RewriterBuilder) -> RewriterBuilder + Send + Sync + 'static,
  {
    self.hook = Some(Arc::new(hook));
    self.rebuild();
    self
  }

  /// The current snapshot.
  #[must_use]
  pub fn snapshot(&self) -> Arc<Snapshot> {
    Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
  }

  /// Swap in a new configuration and return its snapshot.
  pub fn replace(&self, config: Config) -> Arc<Snapshot> {
    let snapshot = Arc::new(Snapshot::build(
      config,
      self.filter.as_deref(),
      self.hook.as_deref(),
    ));
    *self.current.write().unwrap_or_else(PoisonError::into_inner) =
      Arc::clone(&snapshot);
    log::debug!(
      "Configuration replaced, {} links active",
      snapshot.rewriter().map_or(0, |r| r.table().len())
    );
    snapshot
  }

  /// Reload from a TOML or JSON file. On error the current snapshot stays.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed.
  pub fn reload<P: AsRef<Path>>(
    &self,
    path: P,
  ) -> Result<Arc<Snapshot>, ConfigError> {
    let config = Config::from_file(path)?;
    Ok(self.replace(config))
  }

  /// Apply `KEY=VALUE` overrides on top of the current source configuration.
  ///
  /// # Errors
  ///
  /// Returns an error if any override is invalid; nothing is changed then.
  pub fn apply_overrides(
    &self,
    overrides: &[String],
  ) -> Result<Arc<Snapshot>, ConfigError> {
    let mut config = self.snapshot().source.clone();
    config.apply_overrides(overrides)?;
    Ok(self.replace(config))
  }

  fn rebuild(&self) {
    let source = self.snapshot().source.clone();
    self.replace(source);
  }
}
