//! Configuration for keylink: the option bundle, where it comes from and how
//! it turns into a [`keylink::Rewriter`].
pub mod config;
pub mod error;
pub mod store;

pub use config::{Config, ConfigFilter, DEFAULT_SINGLES};
pub use error::ConfigError;
pub use store::{ConfigStore, Snapshot};
