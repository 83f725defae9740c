//! Reddit adapter: the public `search.json` listing.
//!
//! No credentials are needed. The listing endpoint has no date filter
//! finer than `t=`, so date bounds are applied to `created_utc` here.

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::http;
use crate::normalize;
use crate::platform::{until_cancelled, PlatformAdapter, PlatformQuery};
use crate::types::{Platform, SearchResult};

/// Public Reddit endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

/// Listing endpoint's page size ceiling.
const API_MAX_LIMIT: usize = 100;

/// Reddit search listing client.
pub struct RedditAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl RedditAdapter {
    /// Create an adapter against `base_url`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn fetch(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, SearchError> {
        let limit = query.max_results.min(API_MAX_LIMIT).to_string();
        let listing: Listing = http::fetch_json(
            Platform::Reddit,
            self.client
                .get(format!("{}/search.json", self.base_url))
                .query(&[
                    ("q", query.text.as_str()),
                    ("limit", limit.as_str()),
                    ("sort", "new"),
                    ("t", "all"),
                    ("raw_json", "1"),
                ]),
        )
        .await?;

        Ok(parse_reddit_listing(listing, query))
    }
}

#[async_trait]
impl PlatformAdapter for RedditAdapter {
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query = %query.text, "Reddit search");
        until_cancelled(&cancel, self.fetch(query)).await
    }

    fn platform(&self) -> Platform {
        Platform::Reddit
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Listing {
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Child {
    data: Post,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Post {
    id: Option<String>,
    title: Option<String>,
    selftext: Option<String>,
    author: Option<String>,
    permalink: Option<String>,
    url: Option<String>,
    /// Net votes; can be negative.
    score: Option<i64>,
    num_comments: Option<i64>,
    created_utc: Option<f64>,
}

/// Map a search listing to results, keeping posts inside the date bounds.
pub(crate) fn parse_reddit_listing(listing: Listing, query: &PlatformQuery) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for Child { data: post } in listing.data.children {
        let Some(native_id) = post.id.filter(|id| !id.is_empty()) else {
            tracing::debug!("skipping Reddit post without an id");
            continue;
        };

        let published_at = normalize::from_unix_secs(post.created_utc.unwrap_or(0.0) as i64);
        if !query.within_bounds(published_at) {
            continue;
        }

        let link = match (post.permalink, post.url) {
            (Some(permalink), _) if !permalink.is_empty() => {
                format!("https://www.reddit.com{permalink}")
            }
            (_, Some(url)) => url,
            _ => format!("https://www.reddit.com/comments/{native_id}"),
        };

        results.push(SearchResult {
            id: normalize::result_id(Platform::Reddit, &native_id),
            title: post.title.unwrap_or_default(),
            snippet: normalize::truncate_snippet(post.selftext.as_deref()),
            source: Platform::Reddit.label().to_string(),
            url: normalize::canonical_url(&link),
            published_at,
            author: post.author.unwrap_or_default(),
            engagement_count: post.score.unwrap_or(0).max(0).unsigned_abs(),
            comment_count: post.num_comments.unwrap_or(0).max(0).unsigned_abs(),
            source_id: native_id,
        });

        if results.len() >= query.max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "Reddit results parsed");
    results
}
