//! BlueSky adapter: `app.bsky.feed.searchPosts` on the public AppView.

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::http;
use crate::normalize;
use crate::platform::{until_cancelled, PlatformAdapter, PlatformQuery};
use crate::types::{Platform, SearchResult};

/// Public unauthenticated AppView.
pub const DEFAULT_BASE_URL: &str = "https://public.api.bsky.app";

const API_MAX_LIMIT: usize = 100;

/// BlueSky post search client.
pub struct BlueSkyAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl BlueSkyAdapter {
    /// Create an adapter against `base_url`.
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn fetch(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, SearchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("q", query.text.clone()),
            ("limit", query.max_results.min(API_MAX_LIMIT).to_string()),
            ("sort", "latest".into()),
        ];
        if let Some(from) = query.from_date {
            params.push(("since", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = query.to_date {
            params.push(("until", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let response: SearchPostsResponse = http::fetch_json(
            Platform::BlueSky,
            self.client
                .get(format!("{}/xrpc/app.bsky.feed.searchPosts", self.base_url))
                .query(&params),
        )
        .await?;

        Ok(parse_bluesky_response(response, query.max_results))
    }
}

#[async_trait]
impl PlatformAdapter for BlueSkyAdapter {
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query = %query.text, "BlueSky search");
        until_cancelled(&cancel, self.fetch(query)).await
    }

    fn platform(&self) -> Platform {
        Platform::BlueSky
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchPostsResponse {
    posts: Vec<PostView>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PostView {
    uri: String,
    author: Author,
    record: PostRecord,
    like_count: u64,
    repost_count: u64,
    reply_count: u64,
    indexed_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Author {
    handle: String,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PostRecord {
    text: String,
    created_at: Option<String>,
}

/// Record key: the last path segment of an `at://did/collection/rkey` URI.
fn record_key(uri: &str) -> Option<&str> {
    uri.strip_prefix("at://")?
        .rsplit('/')
        .next()
        .filter(|rkey| !rkey.is_empty())
}

/// Map a `searchPosts` page to results.
pub(crate) fn parse_bluesky_response(
    response: SearchPostsResponse,
    max_results: usize,
) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for post in response.posts {
        let Some(rkey) = record_key(&post.uri) else {
            tracing::debug!(uri = %post.uri, "skipping BlueSky post with unusable uri");
            continue;
        };

        let author = post
            .author
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| post.author.handle.clone());
        let published = post.record.created_at.or(post.indexed_at);

        results.push(SearchResult {
            id: normalize::result_id(Platform::BlueSky, rkey),
            title: normalize::title_from_text(&post.record.text),
            snippet: normalize::truncate_snippet(Some(&post.record.text)),
            source: Platform::BlueSky.label().to_string(),
            source_id: rkey.to_string(),
            url: normalize::canonical_url(&format!(
                "https://bsky.app/profile/{}/post/{rkey}",
                post.author.handle
            )),
            published_at: normalize::parse_timestamp(published.as_deref()),
            author,
            engagement_count: post.like_count.saturating_add(post.repost_count),
            comment_count: post.reply_count,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "BlueSky results parsed");
    results
}
