//! The sanitized keyword → URL table.
//!
//! Entries are cleaned once at load time. Anything that fails cleaning is
//! dropped on its own; a bad row never takes the rest of the table with it.
use indexmap::IndexMap;
use log::debug;
use url::Url;

use crate::{
  error::{RewriteError, RewriteResult},
  normalize::{normalize_case, normalize_quotes},
  utils::strip_tags,
};

/// URL schemes a link may point at.
const ALLOWED_SCHEMES: &[&str] =
  &["http", "https", "mailto", "tel", "ftp", "ftps", "sms"];

/// One keyword and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
  /// Lower-cased, quote-normalized trigger phrase.
  pub keyword: String,
  /// Sanitized destination, absolute or relative.
  pub url:     String,
}

/// Ordered, immutable table of link entries.
///
/// Configuration order is priority order: the first keyword to claim a piece
/// of text wins, because it is processed before the others see that text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
  entries: Vec<LinkEntry>,
}

impl LinkTable {
  /// Build a table from raw keyword/URL pairs, preserving their order.
  ///
  /// A keyword that appears twice keeps its first position and takes the
  /// later URL.
  pub fn load<I, K, V>(pairs: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
  {
    let mut sanitized: IndexMap<String, String> = IndexMap::new();

    for (raw_keyword, raw_url) in pairs {
      let (raw_keyword, raw_url) = (raw_keyword.as_ref(), raw_url.as_ref());
      match sanitize_entry(raw_keyword, raw_url) {
        Ok(entry) => {
          sanitized.insert(entry.keyword, entry.url);
        },
        Err(e) => debug!("Dropping link entry: {e}"),
      }
    }

    Self {
      entries: sanitized
        .into_iter()
        .map(|(keyword, url)| LinkEntry { keyword, url })
        .collect(),
    }
  }

  /// Number of usable entries.
  #[must_use]
  pub const fn len(&self) -> usize {
    self.entries.len()
  }

  /// Whether no entry survived sanitization.
  #[must_use]
  pub const fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Entries in priority order.
  pub fn iter(&self) -> std::slice::Iter<'_, LinkEntry> {
    self.entries.iter()
  }

  /// Destination for an already-normalized keyword.
  #[must_use]
  pub fn get(&self, keyword: &str) -> Option<&str> {
    self
      .entries
      .iter()
      .find(|entry| entry.keyword == keyword)
      .map(|entry| entry.url.as_str())
  }
}

impl<'a> IntoIterator for &'a LinkTable {
  type IntoIter = std::slice::Iter<'a, LinkEntry>;
  type Item = &'a LinkEntry;

  fn into_iter(self) -> Self::IntoIter {
    self.iter()
  }
}

fn sanitize_entry(raw_keyword: &str, raw_url: &str) -> RewriteResult<LinkEntry> {
  let keyword = sanitize_keyword(raw_keyword)?;
  let url = sanitize_url(raw_url)?;
  Ok(LinkEntry { keyword, url })
}

/// Clean a keyword the same way document text is normalized before matching.
///
/// # Errors
///
/// Returns [`RewriteError::ConfigInvalid`] if nothing is left after cleaning.
pub fn sanitize_keyword(raw: &str) -> RewriteResult<String> {
  let stripped = strip_tags(raw);
  let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
  let keyword = normalize_case(&normalize_quotes(&collapsed));
  let keyword = keyword.trim();

  if keyword.is_empty() {
    return Err(RewriteError::invalid(raw, "keyword is empty"));
  }
  Ok(keyword.to_string())
}

/// Validate and clean a destination URL.
///
/// Spaces are percent-encoded, characters that cannot appear in a URL are
/// removed, and only allow-listed schemes survive. Values starting with `/`,
/// `#` or `?` are kept as relative URLs; other values without a scheme get
/// `http://` prepended.
///
/// # Errors
///
/// Returns [`RewriteError::ConfigInvalid`] for empty values, control
/// characters, disallowed schemes and absolute URLs that do not parse.
pub fn sanitize_url(raw: &str) -> RewriteResult<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(RewriteError::invalid(raw, "URL is empty"));
  }
  if trimmed.chars().any(char::is_control) {
    return Err(RewriteError::invalid(raw, "URL contains control characters"));
  }

  let cleaned: String = trimmed
    .replace(' ', "%20")
    .chars()
    .filter(|&c| is_url_char(c))
    .collect();
  if cleaned.is_empty() {
    return Err(RewriteError::invalid(raw, "URL is empty after cleaning"));
  }

  if cleaned.starts_with(['/', '#', '?']) {
    return Ok(cleaned);
  }

  let Some((scheme, _)) = cleaned.split_once(':') else {
    return validate_absolute(raw, format!("http://{cleaned}"));
  };

  let scheme = scheme.to_ascii_lowercase();
  if !ALLOWED_SCHEMES.contains(&scheme.as_str()) {
    return Err(RewriteError::invalid(
      raw,
      format!("scheme '{scheme}' is not allowed"),
    ));
  }

  if scheme == "http" || scheme == "https" {
    validate_absolute(raw, cleaned)
  } else {
    Ok(cleaned)
  }
}

fn validate_absolute(raw: &str, candidate: String) -> RewriteResult<String> {
  match Url::parse(&candidate) {
    Ok(parsed) if parsed.host_str().is_some_and(|h| !h.is_empty()) => {
      Ok(candidate)
    },
    Ok(_) => Err(RewriteError::invalid(raw, "URL has no host")),
    Err(e) => Err(RewriteError::invalid(raw, e.to_string())),
  }
}

fn is_url_char(c: char) -> bool {
  c.is_ascii_alphanumeric()
    || !c.is_ascii()
    || matches!(
      c,
      '-'
        | '~'
        | '+'
        | '_'
        | '.'
        | '?'
        | '#'
        | '='
        | '!'
        | '&'
        | ';'
        | ','
        | '/'
        | ':'
        | '%'
        | '@'
        | '$'
        | '|'
        | '*'
        | '\''
        | '('
        | ')'
        | '['
        | ']'
    )
}
