//! Twitter adapter: API v2 recent search with a bearer token.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::http;
use crate::normalize;
use crate::platform::{until_cancelled, PlatformAdapter, PlatformQuery};
use crate::types::{Platform, SearchResult};

/// Public API v2 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2";

/// Recent search accepts `max_results` only within this range.
const API_MIN_RESULTS: usize = 10;
const API_MAX_RESULTS: usize = 100;

/// Twitter recent-search client.
pub struct TwitterAdapter {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl TwitterAdapter {
    /// Create an adapter against `base_url` authenticating with `bearer_token`.
    pub fn new(client: reqwest::Client, base_url: String, bearer_token: String) -> Self {
        Self {
            client,
            base_url,
            bearer_token,
        }
    }

    async fn fetch(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, SearchError> {
        let max_results = query
            .max_results
            .clamp(API_MIN_RESULTS, API_MAX_RESULTS)
            .to_string();
        let mut params: Vec<(&str, String)> = vec![
            ("query", query.text.clone()),
            ("max_results", max_results),
            ("tweet.fields", "created_at,public_metrics,author_id".into()),
            ("expansions", "author_id".into()),
            ("user.fields", "username,name".into()),
        ];
        if let Some(from) = query.from_date {
            params.push(("start_time", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = query.to_date {
            params.push(("end_time", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let response: SearchRecentResponse = http::fetch_json(
            Platform::Twitter,
            self.client
                .get(format!("{}/tweets/search/recent", self.base_url))
                .bearer_auth(&self.bearer_token)
                .query(&params),
        )
        .await?;

        Ok(parse_twitter_response(response, query.max_results))
    }
}

#[async_trait]
impl PlatformAdapter for TwitterAdapter {
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query = %query.text, "Twitter search");
        until_cancelled(&cancel, self.fetch(query)).await
    }

    fn platform(&self) -> Platform {
        Platform::Twitter
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchRecentResponse {
    data: Vec<Tweet>,
    includes: Includes,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Tweet {
    id: Option<String>,
    text: Option<String>,
    author_id: Option<String>,
    created_at: Option<String>,
    public_metrics: PublicMetrics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublicMetrics {
    retweet_count: u64,
    reply_count: u64,
    like_count: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Includes {
    users: Vec<User>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct User {
    id: String,
    username: String,
    name: String,
}

/// Map a recent-search page to results, resolving authors through
/// `includes.users`.
pub(crate) fn parse_twitter_response(
    response: SearchRecentResponse,
    max_results: usize,
) -> Vec<SearchResult> {
    let users: HashMap<&str, &User> = response
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u))
        .collect();

    let mut results = Vec::new();
    for tweet in &response.data {
        let Some(native_id) = tweet.id.as_deref().filter(|id| !id.is_empty()) else {
            tracing::debug!("skipping tweet without an id");
            continue;
        };
        let author = tweet.author_id.as_deref().and_then(|id| users.get(id));
        let text = tweet.text.as_deref().unwrap_or_default();

        // Without a username the /i/web path still resolves.
        let link = match author {
            Some(user) if !user.username.is_empty() => {
                format!("https://x.com/{}/status/{native_id}", user.username)
            }
            _ => format!("https://x.com/i/web/status/{native_id}"),
        };

        let metrics = &tweet.public_metrics;
        results.push(SearchResult {
            id: normalize::result_id(Platform::Twitter, native_id),
            title: normalize::title_from_text(text),
            snippet: normalize::truncate_snippet(Some(text)),
            source: Platform::Twitter.label().to_string(),
            source_id: native_id.to_string(),
            url: normalize::canonical_url(&link),
            published_at: normalize::parse_timestamp(tweet.created_at.as_deref()),
            author: author.map(|u| u.name.clone()).unwrap_or_default(),
            engagement_count: metrics.like_count.saturating_add(metrics.retweet_count),
            comment_count: metrics.reply_count,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "Twitter results parsed");
    results
}
