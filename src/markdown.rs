//! Markdown link rewriting for user-facing messages.

use once_cell::sync::Lazy;
use regex::Regex;

// Matches an existing markdown link first so it passes through untouched,
// then any bare http(s) URL. URL shape: scheme, one character that is not
// whitespace or a URL-terminating symbol, then anything up to whitespace.
static LINK_OR_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[[^\]]*\]\([^)\s]*\)|https?://[^\s/$.?#].[^\s]*").unwrap()
});

/// Rewrites every bare `http(s)://` URL in `text` into a `[url](url)`
/// markdown link. URLs can appear mid-sentence; existing markdown links are
/// left alone, so applying the rewrite twice yields the same string.
pub fn convert_links_to_markdown(text: &str) -> String {
    LINK_OR_URL
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            if matched.starts_with('[') {
                matched.to_string()
            } else {
                format!("[{matched}]({matched})")
            }
        })
        .into_owned()
}
