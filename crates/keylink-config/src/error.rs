use std::{io, path::PathBuf};

use thiserror::Error;

/// Error type for keylink-config operations
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("Configuration error: {0}")]
  Config(String),

  #[error("Failed to read config file: {}: {source}", path.display())]
  Io { path: PathBuf, source: io::Error },

  #[error("Serde error: {0}")]
  Serde(#[from] serde_json::Error),

  #[error("TOML error: {0}")]
  Toml(#[from] toml::de::Error),
}
