//! YouTube adapter: Data API v3 video search.
//!
//! One `search` call finds videos, then one batched `videos` call fills in
//! view and comment counts. A failed statistics call degrades the counts
//! to 0 rather than dropping the results.

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

/// Public Data API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// The API rejects `maxResults` above this.
const API_MAX_RESULTS: usize = 50;

/// YouTube Data API client.
pub struct YouTubeAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl YouTubeAdapter {
    /// Create an adapter against `base_url` authenticating with `api_key`.
    pub fn new(client: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    async fn fetch(&self, query: &PlatformQuery) -> Result<Vec<SearchResult>, SearchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("part", "snippet".into()),
            ("type", "video".into()),
            ("q", query.text.clone()),
            ("maxResults", query.max_results.min(API_MAX_RESULTS).to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(from) = query.from_date {
            params.push(("publishedAfter", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = query.to_date {
            params.push(("publishedBefore", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        let listing: SearchListResponse = http::fetch_json(
            Platform::YouTube,
            self.client
                .get(format!("{}/search", self.base_url))
                .query(&params),
        )
        .await?;

        let ids: Vec<&str> = listing
            .items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect();
        let stats = if ids.is_empty() {
            HashMap::new()
        } else {
            match self.fetch_statistics(&ids).await {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(error = %e, "YouTube statistics unavailable, counts default to 0");
                    HashMap::new()
                }
            }
        };

        Ok(parse_youtube_response(listing, &stats, query.max_results))
    }

    async fn fetch_statistics(
        &self,
        ids: &[&str],
    ) -> Result<HashMap<String, Statistics>, SearchError> {
        let joined = ids.join(",");
        let videos: VideoListResponse = http::fetch_json(
            Platform::YouTube,
            self.client
                .get(format!("{}/videos", self.base_url))
                .query(&[
                    ("part", "statistics"),
                    ("id", joined.as_str()),
                    ("key", self.api_key.as_str()),
                ]),
        )
        .await?;

        Ok(videos
            .items
            .into_iter()
            .filter_map(|v| Some((v.id, v.statistics?)))
            .collect())
    }
}

#[async_trait]
impl PlatformAdapter for YouTubeAdapter {
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query = %query.text, "YouTube search");
        until_cancelled(&cancel, self.fetch(query)).await
    }

    fn platform(&self) -> Platform {
        Platform::YouTube
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct SearchListResponse {
    items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchItem {
    id: ItemId,
    snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ItemId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    description: Option<String>,
    channel_title: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoListResponse {
    items: Vec<VideoItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VideoItem {
    id: String,
    statistics: Option<Statistics>,
}

/// The API reports counts as decimal strings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct Statistics {
    view_count: Option<String>,
    comment_count: Option<String>,
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(0)
}

/// Map a search listing plus per-video statistics to results.
///
/// Items without a video id (channels, playlists) are skipped.
pub(crate) fn parse_youtube_response(
    listing: SearchListResponse,
    stats: &HashMap<String, Statistics>,
    max_results: usize,
) -> Vec<SearchResult> {
    let mut results = Vec::new();

    for item in listing.items {
        let Some(video_id) = item.id.video_id.filter(|id| !id.is_empty()) else {
            tracing::debug!("skipping YouTube item without a video id");
            continue;
        };
        let statistics = stats.get(&video_id).cloned().unwrap_or_default();
        let snippet = item.snippet;

        results.push(SearchResult {
            id: normalize::result_id(Platform::YouTube, &video_id),
            title: snippet.title.unwrap_or_default(),
            snippet: normalize::truncate_snippet(snippet.description.as_deref()),
            source: Platform::YouTube.label().to_string(),
            url: normalize::canonical_url(&format!("https://www.youtube.com/watch?v={video_id}")),
            published_at: normalize::parse_timestamp(snippet.published_at.as_deref()),
            author: snippet.channel_title.unwrap_or_default(),
            engagement_count: parse_count(statistics.view_count.as_deref()),
            comment_count: parse_count(statistics.comment_count.as_deref()),
            source_id: video_id,
        });

        if results.len() >= max_results {
            break;
        }
    }

    tracing::debug!(count = results.len(), "YouTube results parsed");
    results
}
