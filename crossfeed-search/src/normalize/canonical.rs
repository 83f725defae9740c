//! Canonical result URLs.
//!
//! Platforms hand back links with share/tracking decorations. Results
//! carry one canonical form: fragment and default port removed,
//! tracking parameters stripped, remaining parameters sorted, trailing
//! slash dropped.

use url::Url;

/// Tracking query parameters stripped during canonicalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
    "ref_src",
    "si",
    "feature",
    "share_id",
];

/// Canonicalise a result URL.
///
/// If the input cannot be parsed as an absolute URL it is returned
/// trimmed but otherwise unchanged.
///
/// ```
/// use crossfeed_search::normalize::canonical::canonical_url;
///
/// let a = canonical_url("https://www.YouTube.com/watch?v=abc&feature=share#t=1");
/// assert_eq!(a, "https://www.youtube.com/watch?v=abc");
/// ```
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}

fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
