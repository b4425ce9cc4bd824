//! Tweet text to cast text
//!
//! The timeline API appends a `t.co` permalink to tweets that carry media or
//! quote another tweet. That link is always the last URL in `full_text`, so
//! the last URL is dropped and anything the author linked earlier is kept.

use regex::Regex;
use std::sync::LazyLock;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z][A-Za-z0-9+.\-]*://\S+").expect("URL pattern is valid")
});

/// Normalize tweet text for casting: remove the last URL, collapse the
/// whitespace around where it was, trim, and decode Twitter's HTML escapes.
pub fn normalize_cast_text(text: &str) -> String {
    let Some(last_url) = URL_PATTERN.find_iter(text).last() else {
        return decode_entities(text.trim());
    };

    let before = text[..last_url.start()].trim_end();
    let after = text[last_url.end()..].trim_start();

    let joined = if before.is_empty() || after.is_empty() {
        format!("{}{}", before, after)
    } else {
        format!("{} {}", before, after)
    };

    decode_entities(joined.trim())
}

fn decode_entities(text: &str) -> String {
    // `&amp;` goes last so "&amp;lt;" decodes to "&lt;", not "<"
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_trailing_permalink() {
        assert_eq!(
            normalize_cast_text("Check this out https://t.co/abc123"),
            "Check this out"
        );
    }

    #[test]
    fn leaves_text_without_links_unchanged() {
        assert_eq!(normalize_cast_text("no links here"), "no links here");
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert_eq!(normalize_cast_text(""), "");
        assert_eq!(normalize_cast_text("   "), "");
    }

    #[test]
    fn removes_only_the_last_url() {
        assert_eq!(
            normalize_cast_text("See https://a.com and also https://b.com"),
            "See https://a.com and also"
        );
    }

    #[test]
    fn collapses_whitespace_around_a_mid_text_url() {
        assert_eq!(
            normalize_cast_text("before   https://t.co/x   after"),
            "before after"
        );
    }

    #[test]
    fn url_only_tweet_normalizes_to_empty() {
        assert_eq!(normalize_cast_text("https://t.co/abc123"), "");
    }

    #[test]
    fn keeps_author_line_breaks() {
        assert_eq!(
            normalize_cast_text("line one\n\nline two https://t.co/abc"),
            "line one\n\nline two"
        );
    }

    #[test]
    fn decodes_html_entities() {
        assert_eq!(
            normalize_cast_text("rust &amp; tokio &lt;3 https://t.co/abc"),
            "rust & tokio <3"
        );
        assert_eq!(normalize_cast_text("&amp;lt;"), "&lt;");
    }

    #[test]
    fn is_deterministic() {
        let input = "gm https://t.co/one https://t.co/two";
        assert_eq!(normalize_cast_text(input), normalize_cast_text(input));
        assert_eq!(normalize_cast_text(input), "gm https://t.co/one");
    }
}
