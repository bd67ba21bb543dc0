//! URL comparisons: self-link detection and the external-link check.
//!
//! Both compare hosts with a leading `www.` removed, so `www.example.com` and
//! `example.com` count as the same site.
use url::{ParseError, Url};

/// Parse the URL of the document being rewritten.
///
/// Protocol-relative URLs (`//example.com/page`) are read as `https`. Returns
/// `None` for empty or unparseable values.
#[must_use]
pub fn parse_document_url(raw: &str) -> Option<Url> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  if raw.starts_with("//") {
    return Url::parse(&format!("https:{raw}")).ok();
  }
  Url::parse(raw).ok()
}

/// Resolve `url` against the document URL when it is relative.
#[must_use]
pub fn resolve(url: &str, base: Option<&Url>) -> Option<Url> {
  match Url::parse(url) {
    Ok(parsed) => Some(parsed),
    Err(ParseError::RelativeUrlWithoutBase) => base?.join(url).ok(),
    Err(_) => None,
  }
}

/// Drop one leading `www.` label.
#[must_use]
pub fn strip_www(host: &str) -> &str {
  host.strip_prefix("www.").unwrap_or(host)
}

/// Whether two hosts name the same site, ignoring `www.` and case.
#[must_use]
pub fn same_host(a: &str, b: &str) -> bool {
  strip_www(&a.to_ascii_lowercase()) == strip_www(&b.to_ascii_lowercase())
}

/// Normalized `host/path` form used to detect links to the current page.
///
/// The scheme, port, query and fragment are ignored, as is a trailing slash.
/// URLs without a host (`mailto:`) have no comparison form.
#[must_use]
pub fn comparison_url(url: &str, base: Option<&Url>) -> Option<String> {
  let resolved = resolve(url.trim(), base)?;
  let host = resolved.host_str()?.to_ascii_lowercase();
  let path = resolved.path().trim_end_matches('/');
  Some(format!("{}{path}", strip_www(&host)))
}

/// Whether a link leaves the current site.
///
/// Relative URLs and URLs without a host are internal. Without a document
/// URL every absolute URL with a host is treated as external.
#[must_use]
pub fn is_external(url: &str, document: Option<&Url>) -> bool {
  let Some(resolved) = resolve(url.trim(), document) else {
    return false;
  };
  let Some(host) = resolved.host_str() else {
    return false;
  };
  document
    .and_then(Url::host_str)
    .is_none_or(|document_host| !same_host(host, document_host))
}
