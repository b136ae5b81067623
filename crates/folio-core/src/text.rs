use std::collections::HashSet;

use crate::route::Route;

/// Lowercase, split on every non-alphanumeric char, drop empties. Indexing and
/// querying both go through here so a term found in a file is always found
/// again by searching for it.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|x| !x.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[must_use]
pub fn tokenize_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}

/// First ATX heading in the document, else the route's file name.
#[must_use]
pub fn extract_title(route: &Route, text: &str) -> String {
    for line in text.lines() {
        let trimmed = line.trim_start();
        if !trimmed.starts_with('#') {
            continue;
        }
        let heading = trimmed.trim_start_matches('#');
        if !heading.is_empty() && !heading.starts_with([' ', '\t']) {
            continue;
        }
        let heading = heading.trim().trim_end_matches('#').trim();
        if !heading.is_empty() {
            return heading.to_string();
        }
    }
    route
        .file_name()
        .map_or_else(|| "/".to_string(), ToString::to_string)
}

/// First line mentioning any of `terms`, or the first non-empty line.
#[must_use]
pub fn excerpt(text: &str, terms: &HashSet<String>, max_chars: usize) -> String {
    let mut first_non_empty = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if first_non_empty.is_none() {
            first_non_empty = Some(trimmed);
        }
        if tokenize(trimmed).iter().any(|token| terms.contains(token)) {
            return truncate_text(trimmed, max_chars);
        }
    }
    first_non_empty
        .map(|line| truncate_text(line, max_chars))
        .unwrap_or_default()
}

#[must_use]
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let Some((clip_idx, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };

    let mut out = text[..clip_idx].to_string();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(raw: &str) -> Route {
        Route::parse(raw).expect("route")
    }

    #[test]
    fn tokenize_folds_case_and_strips_punctuation() {
        assert_eq!(
            tokenize("Hello, World! foo_bar-baz  42x"),
            vec!["hello", "world", "foo", "bar", "baz", "42x"]
        );
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn tokenize_is_symmetric_between_content_and_query() {
        let content = "The Quick-Brown fox: JUMPED";
        let indexed = tokenize_set(content);
        for query in ["quick", "QUICK", "Brown!", "jumped", "Fox"] {
            for term in tokenize(query) {
                assert!(indexed.contains(&term), "{term} must be retrievable");
            }
        }
    }

    #[test]
    fn tokenize_keeps_unicode_letters() {
        assert_eq!(tokenize("Café Über"), vec!["café", "über"]);
    }

    #[test]
    fn title_prefers_first_heading() {
        let text = "intro line\n\n## Getting Started ##\n# Later";
        assert_eq!(extract_title(&route("/a/b.md"), text), "Getting Started");
    }

    #[test]
    fn title_ignores_hashtags_and_falls_back_to_file_name() {
        let text = "#tag is not a heading\nbody";
        assert_eq!(extract_title(&route("/notes/todo.md"), text), "todo.md");
        assert_eq!(extract_title(&Route::root(), ""), "/");
    }

    #[test]
    fn excerpt_picks_matching_line() {
        let terms: HashSet<String> = ["needle".to_string()].into_iter().collect();
        let text = "# Title\n\nfirst line\nthe Needle is here\n";
        assert_eq!(excerpt(text, &terms, 80), "the Needle is here");
        let none: HashSet<String> = HashSet::new();
        assert_eq!(excerpt(text, &none, 80), "# Title");
    }

    #[test]
    fn truncate_text_preserves_utf8_char_boundaries() {
        let input = "\u{C548}\u{B155}\u{D558}\u{C138}\u{C694}-hello";
        let clipped = truncate_text(input, 5);
        let expected = format!("{}...", "\u{C548}\u{B155}\u{D558}\u{C138}\u{C694}");
        assert_eq!(clipped, expected);
        assert_eq!(truncate_text("hello", 5), "hello");
    }
}
