//! Plain-text extraction from editor HTML.

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Strip HTML markup and return readable text.
///
/// Tags become word breaks, the common named entities are decoded and runs
/// of whitespace collapse to a single space.
pub fn strip_html(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    // &amp; last so "&amp;lt;" decodes to "&lt;" rather than "<"
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Plain-text preview of at most `max_chars` characters.
///
/// Truncated previews end with an ellipsis.
pub fn preview(html: &str, max_chars: usize) -> String {
    let text = strip_html(html);
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('…');
    cut
}
