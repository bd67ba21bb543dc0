#![allow(clippy::unwrap_used, reason = "Fine in tests")]
use std::sync::Arc;

use keylink::{
  LinkAttributes,
  LinkTable,
  RewriteContext,
  RewriteLimits,
  Rewriter,
};

fn widgets_table() -> LinkTable {
  LinkTable::load([("widgets", "https://example.com/widgets")])
}

fn init_logging() {
  let _ = env_logger::builder().is_test(true).try_init();
}

fn link_count(html: &str) -> usize {
  html.matches("class=\"keylink\"").count()
}

#[test]
fn test_links_first_occurrence_only() {
  init_logging();
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());

  let out = rewriter.rewrite(
    "<p>We sell widgets and more widgets.</p>",
    &RewriteContext::default(),
  );

  assert_eq!(
    out,
    r#"<p>We sell <a href="https://example.com/widgets" class="keylink">widgets</a> and more widgets.</p>"#
  );
}

#[test]
fn test_self_link_is_suppressed() {
  init_logging();
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());
  let html = "<p>We sell widgets and more widgets.</p>";

  let out =
    rewriter.rewrite(html, &RewriteContext::for_url("https://example.com/widgets"));
  assert_eq!(out, html);
}

#[test]
fn test_self_link_ignores_www_scheme_and_trailing_slash() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());
  let html = "<p>widgets</p>";

  for current in [
    "https://www.example.com/widgets/",
    "http://example.com/widgets",
    "//www.example.com/widgets?page=2",
  ] {
    assert_eq!(
      rewriter.rewrite(html, &RewriteContext::for_url(current)),
      html,
      "linked from {current}"
    );
  }
}

#[test]
fn test_relative_self_link_is_suppressed() {
  let table = LinkTable::load([("widgets", "/widgets/")]);
  let rewriter = Rewriter::new(table, RewriteLimits::default());
  let html = "<p>widgets</p>";

  let out = rewriter
    .rewrite(html, &RewriteContext::for_url("https://www.example.com/widgets"));
  assert_eq!(out, html);
}

#[test]
fn test_headings_are_never_linked() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());

  let out = rewriter
    .rewrite("<h2>widgets</h2><p>widgets</p>", &RewriteContext::default());

  assert_eq!(
    out,
    r#"<h2>widgets</h2><p><a href="https://example.com/widgets" class="keylink">widgets</a></p>"#
  );
}

#[test]
fn test_limit_spreads_links_evenly() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits {
    per_keyword: 2,
    ..Default::default()
  });
  let html = (0..5)
    .map(|i| format!("<p>{i} widgets</p>"))
    .collect::<String>();

  let out = rewriter.rewrite(&html, &RewriteContext::default());

  let linked: Vec<_> = (0..5)
    .filter(|i| {
      out.contains(&format!(
        r#"<p>{i} <a href="https://example.com/widgets" class="keylink">"#
      ))
    })
    .collect();
  assert_eq!(linked, [0, 2]);
}

#[test]
fn test_existing_links_and_excluded_blocks_are_skipped() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());
  let html = r#"<p><a href="/shop">cheap widgets</a></p><div class="sidebar keylink-exclude"><p>widgets</p></div><blockquote>widgets</blockquote><button>widgets</button>"#;

  assert_eq!(rewriter.rewrite(html, &RewriteContext::default()), html);
}

#[test]
fn test_custom_exclude_class() {
  let rewriter = Rewriter::builder(widgets_table())
    .exclude_class("no-links")
    .build();
  let html = r#"<section class="no-links"><p>widgets</p></section>"#;

  assert_eq!(rewriter.rewrite(html, &RewriteContext::default()), html);
}

#[test]
fn test_one_link_per_text_node() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());

  let out = rewriter.rewrite(
    "<p>widgets widgets widgets</p><p>widgets</p>",
    &RewriteContext::default(),
  );

  assert_eq!(link_count(&out), 2);
}

#[test]
fn test_whole_words_only() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());
  let html = "<p>The widgetsmith sells subwidgets.</p>";

  assert_eq!(rewriter.rewrite(html, &RewriteContext::default()), html);
}

#[test]
fn test_global_max_caps_all_keywords() {
  init_logging();
  let table = LinkTable::load([
    ("widgets", "/widgets"),
    ("gadgets", "/gadgets"),
    ("gizmos", "/gizmos"),
  ]);
  let rewriter = Rewriter::new(table, RewriteLimits {
    global_max: 4,
    ..Default::default()
  });
  let html = "<p>widgets</p><p>gadgets</p><p>gizmos</p>".repeat(3);

  let report = rewriter.rewrite_with_report(&html, &RewriteContext::default());

  assert_eq!(link_count(&report.html), 4);
  assert_eq!(report.state.global_injected, 4);
  assert_eq!(report.state.injected_for("widgets"), 3);
  assert_eq!(report.state.injected_for("gadgets"), 1);
  assert_eq!(report.state.injected_for("gizmos"), 0);
}

#[test]
fn test_per_element_limit() {
  init_logging();
  let table = LinkTable::load([
    ("widgets", "/widgets"),
    ("gadgets", "/gadgets"),
    ("gizmos", "/gizmos"),
  ]);
  let rewriter = Rewriter::new(table, RewriteLimits {
    per_element: 1,
    ..Default::default()
  });

  let out = rewriter.rewrite(
    "<p>widgets and <em>gadgets</em></p><p>gizmos</p>",
    &RewriteContext::default(),
  );

  assert_eq!(
    out,
    r#"<p><a href="/widgets" class="keylink">widgets</a> and <em>gadgets</em></p><p><a href="/gizmos" class="keylink">gizmos</a></p>"#
  );
}

#[test]
fn test_external_links_open_in_new_tab() {
  let table = LinkTable::load([
    ("widgets", "https://example.com/widgets"),
    ("gadgets", "https://gadgets.example.org/"),
  ]);
  let rewriter = Rewriter::new(table, RewriteLimits::default());

  let out = rewriter.rewrite(
    "<p>widgets</p><p>gadgets</p>",
    &RewriteContext::for_url("https://www.example.com/blog/post"),
  );

  assert_eq!(
    out,
    r#"<p><a href="https://example.com/widgets" class="keylink">widgets</a></p><p><a href="https://gadgets.example.org/" target="_blank" rel="noopener" class="keylink">gadgets</a></p>"#
  );
}

#[test]
fn test_attribute_hook() {
  let rewriter = Rewriter::builder(widgets_table())
    .link_class("auto-link")
    .attribute_filter(|mut attrs: LinkAttributes, url: &str, text: &str| {
      attrs.set("title", format!("{text} ({url})"));
      attrs
    })
    .build();

  let out = rewriter.rewrite("<p>Widgets!</p>", &RewriteContext::default());

  assert_eq!(
    out,
    r#"<p><a href="https://example.com/widgets" class="auto-link" title="Widgets (https://example.com/widgets)">Widgets</a>!</p>"#
  );
}

#[test]
fn test_disallowed_hook() {
  let rewriter = Rewriter::builder(widgets_table())
    .disallowed_filter(|entries: Vec<String>| {
      entries.into_iter().filter(|entry| entry != "h2").collect()
    })
    .build();

  assert!(!rewriter.disallowed_entries().contains(&"h2".to_string()));

  let out = rewriter.rewrite("<h2>widgets</h2>", &RewriteContext::default());
  assert_eq!(
    out,
    r#"<h2><a href="https://example.com/widgets" class="keylink">widgets</a></h2>"#
  );
}

#[test]
fn test_straight_and_curly_quotes_match() {
  let table = LinkTable::load([("don't panic", "/guide")]);
  let rewriter = Rewriter::new(table, RewriteLimits::default());

  let straight =
    rewriter.rewrite("<p>Don't panic.</p>", &RewriteContext::default());
  let curly =
    rewriter.rewrite("<p>Don\u{2019}t panic.</p>", &RewriteContext::default());

  assert_eq!(
    straight,
    r#"<p><a href="/guide" class="keylink">Don't panic</a>.</p>"#
  );
  assert_eq!(
    curly,
    "<p><a href=\"/guide\" class=\"keylink\">Don\u{2019}t panic</a>.</p>"
  );
}

#[test]
fn test_multibyte_text_survives() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());

  let out = rewriter.rewrite(
    "<p>Ça coûte 5 € — widgets 日本 🎉</p>",
    &RewriteContext::default(),
  );

  assert_eq!(
    out,
    r#"<p>Ça coûte 5 € — <a href="https://example.com/widgets" class="keylink">widgets</a> 日本 🎉</p>"#
  );
}

#[test]
fn test_unchanged_inputs() {
  let rewriter = Rewriter::new(widgets_table(), RewriteLimits::default());
  let html = "<div><p>Nothing <b>to see</b> here &amp; there.</p></div>";

  assert_eq!(rewriter.rewrite(html, &RewriteContext::default()), html);
  assert_eq!(
    rewriter.rewrite("<p>widgets</p>", &RewriteContext::ineligible()),
    "<p>widgets</p>"
  );
  assert_eq!(rewriter.rewrite("", &RewriteContext::default()), "");
  assert_eq!(rewriter.rewrite(" \t\n", &RewriteContext::default()), " \t\n");
}

#[test]
fn test_invalid_entries_are_dropped() {
  let table = LinkTable::load([
    ("", "/empty"),
    ("widgets", "javascript:alert(1)"),
    ("gadgets", "/gadgets"),
  ]);
  assert_eq!(table.len(), 1);

  let rewriter = Rewriter::new(table, RewriteLimits::default());
  let out = rewriter.rewrite(
    "<p>widgets and gadgets</p>",
    &RewriteContext::default(),
  );
  assert_eq!(
    out,
    r#"<p>widgets and <a href="/gadgets" class="keylink">gadgets</a></p>"#
  );
}

#[test]
fn test_rewriter_shared_across_threads() {
  let rewriter = Arc::new(Rewriter::new(widgets_table(), RewriteLimits {
    per_keyword: 1,
    ..Default::default()
  }));

  let outputs: Vec<String> = std::thread::scope(|scope| {
    let handles: Vec<_> = (0..4)
      .map(|i| {
        let rewriter = Arc::clone(&rewriter);
        scope.spawn(move || {
          rewriter.rewrite(
            &format!("<p>Post {i} about widgets and widgets</p>"),
            &RewriteContext::default(),
          )
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  for (i, out) in outputs.iter().enumerate() {
    assert!(out.starts_with(&format!("<p>Post {i} about <a ")));
    assert_eq!(link_count(out), 1);
  }
}

#[test]
fn test_per_element_limit_survives_class_hook() {
  let table = LinkTable::load([("widgets", "/w"), ("gadgets", "/g")]);
  let rewriter = Rewriter::builder(table)
    .per_element_limit(1)
    .attribute_filter(|mut attrs: LinkAttributes, _url: &str, _text: &str| {
      attrs.set("class", "btn");
      attrs
    })
    .build();

  let out = rewriter.rewrite(
    "<p>widgets and gadgets</p><p>gadgets</p>",
    &RewriteContext::default(),
  );

  assert_eq!(
    out,
    r#"<p><a href="/w" class="btn">widgets</a> and gadgets</p><p><a href="/g" class="btn">gadgets</a></p>"#
  );
}

#[test]
fn test_per_element_limit_with_multi_token_link_class() {
  let table = LinkTable::load([("widgets", "/w"), ("gadgets", "/g")]);
  let rewriter = Rewriter::builder(table)
    .per_element_limit(1)
    .link_class("auto link")
    .build();

  let out = rewriter
    .rewrite("<p>widgets and gadgets</p>", &RewriteContext::default());

  assert_eq!(
    out,
    r#"<p><a href="/w" class="auto link">widgets</a> and gadgets</p>"#
  );
}

#[test]
fn test_stray_control_character_does_not_block_links() {
  let table = LinkTable::load([("widgets", "/w")]);
  let rewriter = Rewriter::new(table, RewriteLimits::default());

  let out = rewriter.rewrite(
    "<p>widgets</p><p>pasted\u{0008}text</p>",
    &RewriteContext::default(),
  );

  assert_eq!(
    out,
    "<p><a href=\"/w\" class=\"keylink\">widgets</a></p><p>pasted\u{0008}text</p>"
  );
}
