//! Parse/serialize round trip for HTML fragments.
//!
//! Content handed to the rewriter is a fragment (a post body, a widget), not a
//! document. It is parsed in a `<body>` context so nothing gets hoisted into an
//! implied `<head>`, and only the children of the fragment root are written
//! back out: no `<html>`/`<body>` wrapper, no doctype.
//!
//! html5ever writes text back as UTF-8 and only escapes `&`, `<`, `>` and
//! non-breaking spaces, so multi-byte characters survive the round trip as-is.
use std::io;

use kuchikikiki::NodeRef;
use log::trace;
use markup5ever::{QualName, local_name, ns};
use tendril::TendrilSink;

use crate::error::{RewriteError, RewriteResult};

/// A parsed, mutable HTML fragment.
///
/// Owned by exactly one rewrite call. Nodes are reference counted internally
/// so the tree is neither `Send` nor `Sync`.
#[derive(Debug, Clone)]
pub struct DocumentTree {
  root: NodeRef,
}

impl DocumentTree {
  /// Parse an HTML fragment.
  ///
  /// Markup errors are recovered from the way browsers do and never reported.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::ParseFailure`] if the content looks like binary
  /// data rather than text. Stray control characters in otherwise textual
  /// content are left to the parser.
  pub fn parse(html: &str) -> RewriteResult<Self> {
    if let Some(reason) = binary_content(html) {
      return Err(RewriteError::ParseFailure(reason));
    }

    let context = QualName::new(None, ns!(html), local_name!("body"));
    let document = kuchikikiki::parse_fragment(context, Vec::new()).one(html);

    // The fragment parser puts everything under a synthetic <html> element.
    let root = document
      .children()
      .find(|child| child.as_element().is_some())
      .unwrap_or(document);

    trace!("Parsed fragment with {} top-level nodes", root.children().count());
    Ok(Self { root })
  }

  /// Parse raw bytes, which must be UTF-8.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::ParseFailure`] for invalid UTF-8 or binary
  /// content.
  pub fn parse_bytes(bytes: &[u8]) -> RewriteResult<Self> {
    let html = std::str::from_utf8(bytes)
      .map_err(|e| RewriteError::ParseFailure(e.to_string()))?;
    Self::parse(html)
  }

  /// The fragment root. Its children are the top-level nodes of the input.
  #[must_use]
  pub const fn root(&self) -> &NodeRef {
    &self.root
  }

  /// Serialize the fragment back to HTML.
  ///
  /// # Errors
  ///
  /// Returns [`RewriteError::Serialize`] if the serializer fails.
  pub fn serialize(&self) -> RewriteResult<String> {
    let mut out = Vec::new();
    for child in self.root.children() {
      child.serialize(&mut out)?;
    }
    String::from_utf8(out).map_err(|e| {
      RewriteError::Serialize(io::Error::new(io::ErrorKind::InvalidData, e))
    })
  }
}

// Only the head of the input is sniffed, the same window git and ripgrep use.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

// One control character in this many sniffed characters marks binary data.
const BINARY_CONTROL_RATIO: usize = 8;

// C0 controls other than tab, line feed, form feed and carriage return.
const fn is_binary_char(c: char) -> bool {
  matches!(c, '\u{0000}'..='\u{0008}' | '\u{000B}' | '\u{000E}'..='\u{001F}')
}

/// Why `html` cannot be treated as text, if it cannot.
fn binary_content(html: &str) -> Option<String> {
  let mut sniffed = 0;
  let mut controls = 0;

  for (pos, c) in html.char_indices() {
    if pos >= BINARY_SNIFF_LEN {
      break;
    }
    if c == '\0' {
      return Some(format!("NUL byte at byte {pos}"));
    }
    sniffed += 1;
    if is_binary_char(c) {
      controls += 1;
    }
  }

  (controls > 0 && controls * BINARY_CONTROL_RATIO >= sniffed).then(|| {
    format!("{controls} control characters in {sniffed} characters")
  })
}
