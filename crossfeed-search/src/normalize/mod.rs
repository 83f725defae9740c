//! Shared pieces of the per-platform result mappers.
//!
//! Each adapter owns a pure `parse_*` function from its native item shape
//! to [`SearchResult`](crate::types::SearchResult). The helpers here keep
//! those mappers consistent: ids are platform-prefixed, snippets are cut
//! to a fixed budget, missing timestamps degrade instead of failing.

pub mod canonical;

use chrono::{DateTime, Utc};

use crate::types::Platform;

pub use canonical::canonical_url;

/// Maximum snippet length in characters, excluding the ellipsis.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Maximum length of a title derived from post text.
pub const TITLE_MAX_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Globally unique result id: `"<platform>_<native id>"`.
pub fn result_id(platform: Platform, native_id: &str) -> String {
    format!("{}_{native_id}", platform.id())
}

/// Collapse whitespace and cut `text` to [`SNIPPET_MAX_CHARS`].
///
/// Returns `None` for absent or blank text. Truncation is on character
/// boundaries and appends `...`.
pub fn truncate_snippet(text: Option<&str>) -> Option<String> {
    let collapsed = collapse_whitespace(text?);
    if collapsed.is_empty() {
        return None;
    }
    Some(truncate_chars(&collapsed, SNIPPET_MAX_CHARS))
}

/// A title for platforms whose posts have none: the first non-blank line
/// of the text, cut to [`TITLE_MAX_CHARS`].
pub fn title_from_text(text: &str) -> String {
    let first_line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    truncate_chars(&collapse_whitespace(first_line), TITLE_MAX_CHARS)
}

/// Unix seconds to UTC; out-of-range values fall back to the epoch.
pub fn from_unix_secs(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// RFC 3339 text to UTC; missing or malformed values fall back to the epoch.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{ELLIPSIS}", text[..cut].trim_end()),
    }
}
