use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use keylink::{
  LinkTable,
  RewriteLimits,
  Rewriter,
  RewriterBuilder,
  utils::sanitize_key,
};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ConfigError;

/// Content types rewritten when no file sets `singles`.
pub const DEFAULT_SINGLES: &[&str] = &["post"];

/// The keylink option bundle.
///
/// [`Config`] holds which content types are rewritten, the link limits and
/// the keyword table. Fields are typically loaded from a TOML or JSON file
/// and can be adjusted with `KEY=VALUE` overrides.
///
/// Fields a file leaves out stay `None`, so merging only replaces what the
/// later file actually sets. Defaults are applied when the values are read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Content types whose documents get links. See [`DEFAULT_SINGLES`].
  #[serde(
    deserialize_with = "one_or_many",
    skip_serializing_if = "Option::is_none"
  )]
  pub singles: Option<Vec<String>>,

  /// Links per keyword per document, `0` for unbounded.
  #[serde(
    deserialize_with = "limit",
    skip_serializing_if = "Option::is_none"
  )]
  pub limit: Option<usize>,

  /// Links per document, `0` for unbounded.
  #[serde(
    alias = "limitMax",
    deserialize_with = "limit_max",
    skip_serializing_if = "Option::is_none"
  )]
  pub limit_max: Option<usize>,

  /// Injected links per block element, `0` for unbounded.
  #[serde(
    alias = "limitEl",
    deserialize_with = "limit_el",
    skip_serializing_if = "Option::is_none"
  )]
  pub limit_el: Option<usize>,

  /// Keyword to URL, in priority order.
  pub links: IndexMap<String, String>,

  /// Additional class that opts a subtree out of rewriting.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exclude_class: Option<String>,

  /// Class for injected anchors. Defaults to `keylink`.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub link_class: Option<String>,

  /// Replacement for the default disallowed-ancestor list. Classes are
  /// written with a leading dot.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub disallowed: Option<Vec<String>>,
}

/// Strategy for replacing the whole option bundle before it is used.
pub trait ConfigFilter: Send + Sync {
  fn filter(&self, config: Config) -> Config;
}

impl<F> ConfigFilter for F
where
  F: Fn(Config) -> Config + Send + Sync,
{
  fn filter(&self, config: Config) -> Config {
    self(config)
  }
}

impl Config {
  /// Load configuration from a TOML or JSON file.
  ///
  /// # Arguments
  ///
  /// * `path` - Path to the configuration file.
  ///
  /// # Errors
  ///
  /// Returns an error if the file cannot be read or parsed, or if the format is
  /// unsupported.
  pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| {
      ConfigError::Io {
        path: path.to_path_buf(),
        source,
      }
    })?;

    let ext = path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(str::to_lowercase);

    match ext.as_deref() {
      Some("json") => {
        Self::from_json(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse JSON config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      Some("toml") => {
        Self::from_toml(&content).map_err(|e| {
          ConfigError::Config(format!(
            "Failed to parse TOML config from {}: {}",
            path.display(),
            e
          ))
        })
      },
      Some(_) => {
        Err(ConfigError::Config(format!(
          "Unsupported config file format: {}",
          path.display()
        )))
      },
      None => {
        Err(ConfigError::Config(format!(
          "Config file has no extension: {}",
          path.display()
        )))
      },
    }
  }

  /// Parse a JSON option bundle.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Serde`] on malformed input.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(content)?)
  }

  /// Parse a TOML option bundle.
  ///
  /// # Errors
  ///
  /// Returns [`ConfigError::Toml`] on malformed input.
  pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(content)?)
  }

  /// Load and merge config files in order, then apply overrides.
  ///
  /// With no files the defaults are used.
  ///
  /// # Errors
  ///
  /// Returns an error if any file fails to load or an override is invalid.
  pub fn load(
    config_files: &[PathBuf],
    config_overrides: &[String],
  ) -> Result<Self, ConfigError> {
    let mut config = Self::default();

    for (i, path) in config_files.iter().enumerate() {
      let loaded = Self::from_file(path)?;
      if i == 0 {
        config = loaded;
      } else {
        config.merge(loaded);
      }
    }

    if config_files.len() > 1 {
      log::info!("Loaded and merged {} config files", config_files.len());
    }

    if !config_overrides.is_empty() {
      config.apply_overrides(config_overrides)?;
    }

    Ok(config)
  }

  /// Merge another config into this one, with the other config's values taking
  /// precedence.
  ///
  /// # Merge Rules
  ///
  /// - `singles`: appended, duplicates dropped
  /// - `links`: merged by keyword, so later files can repoint a keyword
  /// - Other [`Option<T>`] fields: Other's [`Some`] value replaces this
  ///   config's value
  ///
  /// Fields the other config left unset never change this config.
  pub fn merge(&mut self, other: Self) {
    if let Some(singles) = other.singles {
      let merged = self.singles.get_or_insert_with(Vec::new);
      for single in singles {
        if !merged.contains(&single) {
          merged.push(single);
        }
      }
    }
    if other.limit.is_some() {
      self.limit = other.limit;
    }
    if other.limit_max.is_some() {
      self.limit_max = other.limit_max;
    }
    if other.limit_el.is_some() {
      self.limit_el = other.limit_el;
    }
    self.links.extend(other.links);

    if other.exclude_class.is_some() {
      self.exclude_class = other.exclude_class;
    }
    if other.link_class.is_some() {
      self.link_class = other.link_class;
    }
    if other.disallowed.is_some() {
      self.disallowed = other.disallowed;
    }
  }

  /// Apply configuration overrides from KEY=VALUE strings.
  ///
  /// Keys are the field names (`limit`, `limit_max`, `singles`, ...), with
  /// list values separated by commas. `links.<keyword>=<url>` sets one link;
  /// an empty URL removes it.
  ///
  /// # Errors
  ///
  /// Returns an error if:
  ///
  /// - An override string is not in KEY=VALUE format
  /// - A key is not recognized
  /// - A value cannot be parsed as the expected type
  ///
  /// # Example
  ///
  /// ```rust
  /// use keylink_config::Config;
  ///
  /// let mut config = Config::default();
  /// config
  ///   .apply_overrides(&[
  ///     "limit=2".to_string(),
  ///     "links.widgets=https://example.com/widgets".to_string(),
  ///   ])
  ///   .unwrap();
  /// assert_eq!(config.limit, Some(2));
  /// ```
  pub fn apply_overrides(
    &mut self,
    overrides: &[String],
  ) -> Result<(), ConfigError> {
    for override_str in overrides {
      let (key, value) = override_str.split_once('=').ok_or_else(|| {
        ConfigError::Config(format!(
          "Invalid config override format: '{override_str}'. Expected \
           KEY=VALUE"
        ))
      })?;

      self.apply_override(key.trim(), value.trim())?;
    }

    Ok(())
  }

  fn apply_override(
    &mut self,
    key: &str,
    value: &str,
  ) -> Result<(), ConfigError> {
    if let Some(keyword) = key.strip_prefix("links.") {
      if value.is_empty() {
        self.links.shift_remove(keyword);
      } else {
        self.links.insert(keyword.to_string(), value.to_string());
      }
      return Ok(());
    }

    match key {
      "singles" => self.singles = Some(split_list(value)),
      "limit" => self.limit = Some(parse_limit(key, value)?),
      "limit_max" | "limitMax" => {
        self.limit_max = Some(parse_limit(key, value)?);
      },
      "limit_el" | "limitEl" => {
        self.limit_el = Some(parse_limit(key, value)?);
      },
      "exclude_class" => self.exclude_class = non_empty(value),
      "link_class" => self.link_class = non_empty(value),
      "disallowed" => {
        self.disallowed = non_empty(value).map(|v| split_list(&v));
      },
      _ => {
        return Err(ConfigError::Config(format!(
          "Unknown configuration key: '{key}'. See documentation for \
           supported keys."
        )));
      },
    }

    Ok(())
  }

  /// Run the option bundle through `filter` and return the result.
  #[must_use]
  pub fn filtered<F>(self, filter: F) -> Self
  where
    F: FnOnce(Self) -> Self,
  {
    filter(self)
  }

  /// Like [`Self::filtered`], for a stored [`ConfigFilter`].
  #[must_use]
  pub fn apply_filter(self, filter: &dyn ConfigFilter) -> Self {
    filter.filter(self)
  }

  /// Content types as configured, or [`DEFAULT_SINGLES`] when unset.
  #[must_use]
  pub fn singles(&self) -> Vec<String> {
    self.singles.clone().unwrap_or_else(|| {
      DEFAULT_SINGLES.iter().map(ToString::to_string).collect()
    })
  }

  /// `singles` cleaned up as keys, duplicates and blanks dropped.
  #[must_use]
  pub fn sanitized_singles(&self) -> Vec<String> {
    let mut singles: Vec<String> = Vec::new();
    for single in self.singles().iter().map(|s| sanitize_key(s)) {
      if !single.is_empty() && !singles.contains(&single) {
        singles.push(single);
      }
    }
    singles
  }

  /// Whether documents of `content_type` are rewritten.
  #[must_use]
  pub fn is_eligible(&self, content_type: &str) -> bool {
    let content_type = sanitize_key(content_type);
    !content_type.is_empty() && self.sanitized_singles().contains(&content_type)
  }

  #[must_use]
  pub fn limits(&self) -> RewriteLimits {
    RewriteLimits {
      per_keyword: self.limit.unwrap_or_default(),
      per_element: self.limit_el.unwrap_or_default(),
      global_max:  self.limit_max.unwrap_or_default(),
    }
  }

  /// The sanitized link table.
  #[must_use]
  pub fn link_table(&self) -> LinkTable {
    LinkTable::load(&self.links)
  }

  /// A builder preloaded with this configuration, for adding hooks.
  ///
  /// Returns `None` when there is nothing to do: no eligible content types,
  /// or no link survived sanitization.
  #[must_use]
  pub fn rewriter_builder(&self) -> Option<RewriterBuilder> {
    if self.sanitized_singles().is_empty() {
      debug!("No content types configured, rewriting disabled");
      return None;
    }

    let table = self.link_table();
    if table.is_empty() {
      debug!("No usable links configured, rewriting disabled");
      return None;
    }

    let mut builder = Rewriter::builder(table).limits(self.limits());
    if let Some(class) = &self.link_class {
      builder = builder.link_class(class.clone());
    }
    if let Some(class) = &self.exclude_class {
      builder = builder.exclude_class(class.clone());
    }
    if let Some(entries) = &self.disallowed {
      builder = builder.disallowed(entries.iter().cloned());
    }
    Some(builder)
  }

  /// Build the rewriter for this configuration.
  ///
  /// See [`Self::rewriter_builder`] for when this returns `None`.
  #[must_use]
  pub fn build_rewriter(&self) -> Option<Rewriter> {
    self.rewriter_builder().map(RewriterBuilder::build)
  }
}

fn split_list(value: &str) -> Vec<String> {
  value
    .split(',')
    .map(str::trim)
    .filter(|item| !item.is_empty())
    .map(str::to_string)
    .collect()
}

fn non_empty(value: &str) -> Option<String> {
  (!value.is_empty()).then(|| value.to_string())
}

fn parse_limit(key: &str, value: &str) -> Result<usize, ConfigError> {
  if value.is_empty() {
    return Ok(0);
  }
  value.parse::<i64>().map(absolute).map_err(|_| {
    ConfigError::Config(format!(
      "Invalid value for '{key}': '{value}'. Expected a positive integer"
    ))
  })
}

// Negative limits count as their magnitude.
fn absolute(n: i64) -> usize {
  usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX)
}

/// Limits may arrive as numbers or as numeric strings from form submissions.
fn deserialize_limit<'de, D>(
  key: &str,
  deserializer: D,
) -> Result<Option<usize>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum RawLimit {
    Int(i64),
    Text(String),
  }

  match RawLimit::deserialize(deserializer)? {
    RawLimit::Int(n) => Ok(Some(absolute(n))),
    RawLimit::Text(text) => {
      parse_limit(key, text.trim())
        .map(Some)
        .map_err(serde::de::Error::custom)
    },
  }
}

fn limit<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
  D: Deserializer<'de>,
{
  deserialize_limit("limit", deserializer)
}

fn limit_max<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
  D: Deserializer<'de>,
{
  deserialize_limit("limit_max", deserializer)
}

fn limit_el<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
  D: Deserializer<'de>,
{
  deserialize_limit("limit_el", deserializer)
}

/// A single content type may be given as a plain string.
fn one_or_many<'de, D>(
  deserializer: D,
) -> Result<Option<Vec<String>>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum OneOrMany {
    One(String),
    Many(Vec<String>),
  }

  Ok(Some(match OneOrMany::deserialize(deserializer)? {
    OneOrMany::One(single) => vec![single],
    OneOrMany::Many(singles) => singles,
  }))
}

#[cfg(test)]
mod tests {
  #![allow(clippy::unwrap_used, reason = "Fine in tests")]

  use super::*;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.singles(), ["post"]);
    assert_eq!(config.limits(), RewriteLimits::default());
    assert!(config.links.is_empty());
    assert!(config.build_rewriter().is_none());
  }

  #[test]
  fn test_json_with_legacy_keys() {
    let config = Config::from_json(
      r#"{
        "singles": "page",
        "limit": "2",
        "limitMax": 5,
        "limitEl": -1,
        "links": { "Zebra": "/z", "apple": "/a" }
      }"#,
    )
    .unwrap();

    assert_eq!(config.singles(), ["page"]);
    assert_eq!(config.limits(), RewriteLimits {
      per_keyword: 2,
      per_element: 1,
      global_max:  5,
    });
    let keywords: Vec<_> = config.links.keys().map(String::as_str).collect();
    assert_eq!(keywords, ["Zebra", "apple"]);
  }

  #[test]
  fn test_toml_partial_keeps_defaults() {
    let config = Config::from_toml(
      r#"
      limit_max = 3

      [links]
      widgets = "https://example.com/widgets"
      "#,
    )
    .unwrap();

    assert_eq!(config.singles, None);
    assert_eq!(config.singles(), ["post"]);
    assert_eq!(config.limit_max, Some(3));
    assert_eq!(config.limit, None);
    assert_eq!(config.links["widgets"], "https://example.com/widgets");
  }

  #[test]
  fn test_invalid_limit_string_is_an_error() {
    assert!(Config::from_json(r#"{ "limit": "lots" }"#).is_err());
    assert_eq!(
      Config::from_json(r#"{ "limit": "" }"#).unwrap().limit,
      Some(0)
    );
  }

  #[test]
  fn test_invalid_limit_names_its_field() {
    let err = Config::from_json(r#"{ "limitMax": "lots" }"#).unwrap_err();
    assert!(err.to_string().contains("'limit_max'"));

    let err = Config::from_toml(r#"limit_el = "many""#).unwrap_err();
    assert!(err.to_string().contains("'limit_el'"));
  }

  #[test]
  fn test_apply_overrides() {
    let mut config = Config::default();

    config
      .apply_overrides(&[
        "singles=post, page".to_string(),
        "limit=3".to_string(),
        "limitMax=10".to_string(),
        "limit_el=1".to_string(),
        "link_class=auto".to_string(),
        "disallowed=h2,a,.no-links".to_string(),
        "links.widgets=https://example.com/widgets".to_string(),
        "links.gadgets=/gadgets".to_string(),
        "links.gadgets=".to_string(),
      ])
      .unwrap();

    assert_eq!(config.singles(), ["post", "page"]);
    assert_eq!(config.limits(), RewriteLimits {
      per_keyword: 3,
      per_element: 1,
      global_max:  10,
    });
    assert_eq!(config.link_class.as_deref(), Some("auto"));
    assert_eq!(
      config.disallowed,
      Some(vec!["h2".to_string(), "a".to_string(), ".no-links".to_string()])
    );
    assert_eq!(config.links.len(), 1);
  }

  #[test]
  fn test_apply_overrides_invalid_format() {
    let mut config = Config::default();

    let result = config.apply_overrides(&["no_equals_sign".to_string()]);

    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Expected KEY=VALUE")
    );
  }

  #[test]
  fn test_apply_overrides_unknown_key() {
    let mut config = Config::default();

    let result = config.apply_overrides(&["unknown_key=value".to_string()]);

    assert!(
      result
        .unwrap_err()
        .to_string()
        .contains("Unknown configuration key")
    );
  }

  #[test]
  fn test_apply_overrides_invalid_numeric() {
    let mut config = Config::default();

    let result = config.apply_overrides(&["limit=not_a_number".to_string()]);

    assert!(result.unwrap_err().to_string().contains("Invalid value"));
  }

  #[test]
  fn test_merge() {
    let mut base = Config::from_json(
      r#"{ "singles": ["post"], "limit": 2, "links": { "a": "/a", "b": "/b" } }"#,
    )
    .unwrap();
    let other = Config::from_json(
      r#"{ "singles": ["page", "post"], "links": { "b": "/b2", "c": "/c" },
           "link_class": "auto" }"#,
    )
    .unwrap();

    base.merge(other);

    assert_eq!(base.singles(), ["post", "page"]);
    assert_eq!(base.limit, Some(2));
    let links: Vec<_> = base
      .links
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect();
    assert_eq!(links, ["a=/a", "b=/b2", "c=/c"]);
    assert_eq!(base.link_class.as_deref(), Some("auto"));
  }

  #[test]
  fn test_merge_keeps_fields_the_overlay_leaves_out() {
    let mut base =
      Config::from_json(r#"{ "singles": ["page"], "limit": 3, "limitEl": 1 }"#)
        .unwrap();
    let overlay = Config::from_toml("[links]\nb = \"/b\"\n").unwrap();

    base.merge(overlay);

    assert_eq!(base.singles(), ["page"]);
    assert!(!base.is_eligible("post"));
    assert_eq!(base.limits(), RewriteLimits {
      per_keyword: 3,
      per_element: 1,
      global_max:  0,
    });
    assert_eq!(base.links["b"], "/b");
  }

  #[test]
  fn test_merge_into_unset_singles_skips_default() {
    let mut base = Config::default();
    base.merge(Config::from_json(r#"{ "singles": "page" }"#).unwrap());
    assert_eq!(base.singles(), ["page"]);
  }

  #[test]
  fn test_eligibility_uses_sanitized_keys() {
    let config = Config {
      singles: Some(vec!["Post".to_string(), " docs_page ".to_string()]),
      ..Default::default()
    };
    assert!(config.is_eligible("post"));
    assert!(config.is_eligible("Docs_Page"));
    assert!(!config.is_eligible("page"));
    assert!(!config.is_eligible(""));
  }

  #[test]
  fn test_filtered() {
    let config = Config::default().filtered(|mut config| {
      config.limit = Some(7);
      config.links.insert("widgets".to_string(), "/widgets".to_string());
      config
    });
    assert_eq!(config.limit, Some(7));
    assert!(config.build_rewriter().is_some());
  }

  #[test]
  fn test_build_rewriter_needs_singles_and_links() {
    let mut config = Config::default();
    config
      .links
      .insert("widgets".to_string(), "javascript:void(0)".to_string());
    assert!(config.build_rewriter().is_none());

    config
      .links
      .insert("gadgets".to_string(), "/gadgets".to_string());
    assert!(config.build_rewriter().is_some());

    config.singles = Some(vec!["!!".to_string()]);
    assert!(config.build_rewriter().is_none());
  }
}
