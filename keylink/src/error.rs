//! Error types for rewriting operations.
//!
//! None of these are fatal to the caller: [`crate::Rewriter::rewrite`] maps
//! every variant to "return the content unchanged" or "skip this one item".

/// Result type for rewriting operations.
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Errors that can occur while loading links or rewriting a document.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
  /// A keyword or URL failed sanitization. Only that entry is dropped.
  #[error("Invalid link entry '{entry}': {reason}")]
  ConfigInvalid { entry: String, reason: String },

  /// The input could not be treated as markup at all.
  #[error("Content cannot be parsed as HTML: {0}")]
  ParseFailure(String),

  /// A pre-selected text node no longer contains a whole-word match.
  #[error("Keyword '{keyword}' no longer matches the candidate text")]
  NoMatch { keyword: String },

  /// Writing the tree back out failed.
  #[error("Failed to serialize document: {0}")]
  Serialize(#[from] std::io::Error),
}

impl RewriteError {
  pub(crate) fn invalid(
    entry: impl Into<String>,
    reason: impl Into<String>,
  ) -> Self {
    Self::ConfigInvalid {
      entry:  entry.into(),
      reason: reason.into(),
    }
  }
}
