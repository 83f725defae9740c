//! Core types: platform identification, canonical results, responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Content platforms that crossfeed can search.
///
/// The derived `Ord` is the canonical platform order used when hashing
/// platform sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// YouTube: video search through the Data API.
    YouTube,
    /// Reddit: link aggregator with a public search listing.
    Reddit,
    /// Twitter: micro-blogging; recent-search API, gated behind a paid tier.
    Twitter,
    /// BlueSky: micro-blogging over the AT protocol.
    BlueSky,
    /// HackerNews: exposes only top-item feeds, no query search.
    HackerNews,
}

impl Platform {
    /// Canonical lowercase identifier, as accepted in requests.
    pub fn id(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Reddit => "reddit",
            Self::Twitter => "twitter",
            Self::BlueSky => "bluesky",
            Self::HackerNews => "hackernews",
        }
    }

    /// Human-readable label used as the `source` of results.
    pub fn label(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::Reddit => "Reddit",
            Self::Twitter => "Twitter",
            Self::BlueSky => "BlueSky",
            Self::HackerNews => "HackerNews",
        }
    }

    /// Parse a caller-supplied identifier against the allow-list.
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unknown identifiers yield `None`.
    pub fn from_id(raw: &str) -> Option<Self> {
        let wanted = raw.trim().to_lowercase();
        Self::all().iter().copied().find(|p| p.id() == wanted)
    }

    /// Whether the platform exposes a query-based search API.
    pub fn has_native_search(&self) -> bool {
        !matches!(self, Self::HackerNews)
    }

    /// Whether access to the platform is restricted by account tier.
    pub fn is_gated(&self) -> bool {
        matches!(self, Self::Twitter)
    }

    /// Returns all supported platforms in canonical order.
    pub fn all() -> &'static [Platform] {
        &[
            Self::YouTube,
            Self::Reddit,
            Self::Twitter,
            Self::BlueSky,
            Self::HackerNews,
        ]
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Ordering applied to the merged result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Comment count descending, then newest first.
    #[default]
    Chronological,
    /// Weighted score of discussion, popularity and recency.
    Ranked,
}

impl SortMode {
    /// Stable identifier, used in cache keys.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Chronological => "chronological",
            Self::Ranked => "ranked",
        }
    }

    /// Parse a caller-supplied sort mode; anything unrecognised is `None`.
    pub fn from_id(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "chronological" => Some(Self::Chronological),
            "ranked" => Some(Self::Ranked),
            _ => None,
        }
    }
}

/// A single normalised result from any platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Globally unique id: `"<platform>_<native id>"`.
    pub id: String,
    /// Title (for title-less platforms, the opening of the post text).
    pub title: String,
    /// Truncated free text, if the platform supplied any.
    pub snippet: Option<String>,
    /// Platform label, e.g. `"Reddit"`.
    pub source: String,
    /// The platform's own id for the item.
    pub source_id: String,
    /// Canonical link to the item.
    pub url: String,
    /// Publication time in UTC.
    pub published_at: DateTime<Utc>,
    /// Author display name; empty when unknown.
    pub author: String,
    /// Platform-specific popularity signal; 0 when not exposed.
    pub engagement_count: u64,
    /// Number of comments/replies in the whole thread; 0 when not exposed.
    pub comment_count: u64,
}

/// The aggregated answer to one search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Merged, ordered results from every platform searched.
    pub results: Vec<SearchResult>,
    /// Number of results.
    pub total_count: usize,
    /// The requested page, echoed back.
    pub page: u32,
    /// Always equal to `total_count`; no server-side paging is applied.
    pub page_size: usize,
    /// When this response was aggregated.
    pub cached_at: DateTime<Utc>,
    /// The normalised query.
    pub query: String,
    /// Platforms searched, after dropping unknown identifiers.
    pub platforms_searched: Vec<Platform>,
}
