use std::fmt::Write as _;

use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, html};

use crate::index::SearchHit;
use crate::route::Route;

#[must_use]
pub fn markdown_html(content: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(content, options).map(|event| match event {
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: sanitize_link_destination(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: sanitize_image_source(dest_url),
            title,
            id,
        }),
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(CowStr::from(raw.into_string())),
        other => other,
    });

    let mut output = String::new();
    html::push_html(&mut output, parser);
    output
}

/// Escaped source wrapped for client-side highlighting.
#[must_use]
pub fn source_html(content: &str, language: &str) -> String {
    format!(
        "<pre class=\"source\"><code class=\"language-{}\">{}</code></pre>",
        escape_html(language),
        escape_html(content)
    )
}

#[must_use]
pub fn image_html(route: &Route) -> String {
    let src = escape_html(&route.href(Some("raw=1")));
    let alt = escape_html(route.file_name().unwrap_or_default());
    format!("<figure class=\"media\"><img src=\"{src}\" alt=\"{alt}\"><figcaption>{alt}</figcaption></figure>")
}

/// Result listing plus the number of hits rendered.
#[must_use]
pub fn search_html(query: &str, hits: &[SearchHit], index_ready: bool) -> (String, usize) {
    let mut out = String::new();
    let query = escape_html(query);
    if !index_ready {
        out.push_str(
            "<p class=\"notice\">The search index is still being built; results may be incomplete.</p>",
        );
    }
    if hits.is_empty() {
        let _ = write!(out, "<p class=\"empty\">No documents match <q>{query}</q>.</p>");
        return (out, 0);
    }

    let _ = write!(
        out,
        "<p class=\"summary\">{} result{} for <q>{query}</q></p><ol class=\"results\">",
        hits.len(),
        if hits.len() == 1 { "" } else { "s" }
    );
    for hit in hits {
        let href = Route::parse(&hit.route)
            .map_or_else(|_| Route::root().href(None), |route| route.href(None));
        let _ = write!(
            out,
            "<li><a href=\"{}\">{}</a> <span class=\"route\">{}</span><p>{}</p></li>",
            escape_html(&href),
            escape_html(&hit.title),
            escape_html(&hit.route),
            escape_html(&hit.excerpt)
        );
    }
    out.push_str("</ol>");
    (out, hits.len())
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn sanitize_link_destination(dest_url: CowStr<'_>) -> CowStr<'static> {
    let value = dest_url.into_string();
    if is_safe_destination(&value, true) {
        CowStr::from(value)
    } else {
        CowStr::from("#")
    }
}

fn sanitize_image_source(dest_url: CowStr<'_>) -> CowStr<'static> {
    let value = dest_url.into_string();
    if is_safe_destination(&value, false) {
        CowStr::from(value)
    } else {
        CowStr::from("")
    }
}

fn is_safe_destination(value: &str, allow_mailto: bool) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("//") {
        return false;
    }
    if lower.starts_with('#')
        || lower.starts_with('/')
        || lower.starts_with("./")
        || lower.starts_with("../")
    {
        return true;
    }
    if lower.starts_with("http://")
        || lower.starts_with("https://")
        || (allow_mailto && lower.starts_with("mailto:"))
    {
        return true;
    }

    !lower.contains(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_html_strips_raw_html() {
        let rendered = markdown_html("Hello<script>alert(1)</script>");
        assert!(!rendered.contains("<script>"));
        assert!(rendered.contains("alert(1)"));
    }

    #[test]
    fn markdown_html_sanitizes_javascript_links() {
        let rendered = markdown_html("[bad](javascript:alert(1))");
        assert!(rendered.contains("href=\"#\""));
        assert!(!rendered.contains("javascript:"));
    }

    #[test]
    fn markdown_html_preserves_safe_links_and_tables() {
        let rendered = markdown_html("[ok](https://example.com)\n\n| a |\n|---|\n| b |\n");
        assert!(rendered.contains("href=\"https://example.com\""));
        assert!(rendered.contains("<table>"));
    }

    #[test]
    fn source_html_escapes_content() {
        let rendered = source_html("if a < b && c > d { \"x\" }", "rust");
        assert!(rendered.contains("class=\"language-rust\""));
        assert!(rendered.contains("a &lt; b &amp;&amp; c &gt; d"));
        assert!(!rendered.contains("a < b"));
    }

    #[test]
    fn image_html_points_at_raw_bytes() {
        let route = Route::parse("/images/cat.png").expect("route");
        let rendered = image_html(&route);
        assert!(rendered.contains("src=\"/images/cat.png?raw=1\""));
        assert!(rendered.contains("alt=\"cat.png\""));
    }

    #[test]
    fn search_html_lists_hits_and_counts() {
        let hits = vec![SearchHit {
            route: "/a.md".to_string(),
            title: "A <b>".to_string(),
            excerpt: "alpha".to_string(),
            score: 1.5,
            matched_terms: 1,
            total_tf: 1,
        }];
        let (html, count) = search_html("alpha", &hits, true);
        assert_eq!(count, 1);
        assert!(html.contains("href=\"/a.md\""));
        assert!(html.contains("A &lt;b&gt;"));
        assert!(!html.contains("still being built"));

        let (empty, count) = search_html("<x>", &[], false);
        assert_eq!(count, 0);
        assert!(empty.contains("&lt;x&gt;"));
        assert!(empty.contains("still being built"));
    }

    #[test]
    fn links_percent_encode_reserved_characters() {
        let image = Route::parse("/cat#2.png").expect("route");
        assert!(image_html(&image).contains("src=\"/cat%232.png?raw=1\""));

        let hits = vec![SearchHit {
            route: "/a?b.md".to_string(),
            title: "A".to_string(),
            excerpt: String::new(),
            score: 1.5,
            matched_terms: 1,
            total_tf: 1,
        }];
        let (html, _) = search_html("a", &hits, true);
        assert!(html.contains("href=\"/a%3Fb.md\""));
        assert!(html.contains("<span class=\"route\">/a?b.md</span>"));
    }
}
