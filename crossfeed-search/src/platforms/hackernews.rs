//! HackerNews adapter: scan the top-stories feed and filter client-side.
//!
//! The Firebase API has no query endpoint. The adapter takes the first
//! `max_results × scan_multiplier` ids from `topstories.json` and probes
//! them item by item, at most `scan_concurrency` at a time, keeping those
//! whose title matches the query.
//!
//! Matches are accumulated as probes finish. When the shared token is
//! cancelled, or enough matches have been found, no further probes start
//! and whatever was found so far is returned.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::http;
use crate::normalize;
use crate::platform::{until_cancelled, PlatformAdapter, PlatformQuery};
use crate::types::{Platform, SearchResult};

/// Public Firebase endpoint.
pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";

/// (feed position, result) pairs collected by concurrent probes.
type Matches = Arc<Mutex<Vec<(usize, SearchResult)>>>;

/// HackerNews scan-and-filter client.
pub struct HackerNewsAdapter {
    client: reqwest::Client,
    base_url: String,
    scan_multiplier: usize,
    scan_concurrency: usize,
}

impl HackerNewsAdapter {
    /// Create an adapter against `base_url`.
    ///
    /// `scan_multiplier` sets the probe window relative to the requested
    /// result count; `scan_concurrency` caps in-flight item probes.
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        scan_multiplier: usize,
        scan_concurrency: usize,
    ) -> Self {
        Self {
            client,
            base_url,
            scan_multiplier: scan_multiplier.max(1),
            scan_concurrency: scan_concurrency.max(1),
        }
    }

    async fn top_story_ids(&self) -> Result<Vec<u64>, SearchError> {
        http::fetch_json(
            Platform::HackerNews,
            self.client.get(format!("{}/topstories.json", self.base_url)),
        )
        .await
    }

    async fn scan(
        &self,
        ids: Vec<u64>,
        query: &PlatformQuery,
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        let matches: Matches = Arc::new(Mutex::new(Vec::new()));
        let permits = Arc::new(Semaphore::new(self.scan_concurrency));
        let mut probes = JoinSet::new();

        for (position, id) in ids.into_iter().enumerate() {
            if cancel.is_cancelled() || match_count(&matches) >= query.max_results {
                break;
            }

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                permit = permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            // Re-check after waiting: earlier probes may have filled the quota.
            if match_count(&matches) >= query.max_results {
                break;
            }

            let client = self.client.clone();
            let url = format!("{}/item/{id}.json", self.base_url);
            let query = query.clone();
            let cancel = cancel.clone();
            let matches = Arc::clone(&matches);

            probes.spawn(async move {
                let _permit = permit;
                let fetched: Result<Option<Item>, SearchError> =
                    until_cancelled(&cancel, http::fetch_json(Platform::HackerNews, client.get(url)))
                        .await;
                match fetched {
                    Ok(Some(item)) => {
                        if let Some(result) = parse_hackernews_item(item, &query) {
                            matches
                                .lock()
                                .unwrap_or_else(|e| e.into_inner())
                                .push((position, result));
                        }
                    }
                    Ok(None) => {}
                    Err(SearchError::Cancelled) => {}
                    Err(e) => tracing::debug!(item = id, error = %e, "HackerNews probe failed"),
                }
            });
        }

        while let Some(joined) = probes.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "HackerNews probe task panicked");
            }
        }

        let mut found = std::mem::take(&mut *matches.lock().unwrap_or_else(|e| e.into_inner()));
        found.sort_by_key(|(position, _)| *position);
        found.truncate(query.max_results);
        found.into_iter().map(|(_, result)| result).collect()
    }
}

fn match_count(matches: &Matches) -> usize {
    matches.lock().unwrap_or_else(|e| e.into_inner()).len()
}

#[async_trait]
impl PlatformAdapter for HackerNewsAdapter {
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        tracing::trace!(query = %query.text, "HackerNews scan");

        let ids = match until_cancelled(&cancel, self.top_story_ids()).await {
            Ok(ids) => ids,
            // Nothing scanned yet, so nothing partial to keep.
            Err(SearchError::Cancelled) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let window = query.max_results.saturating_mul(self.scan_multiplier);
        let window_ids: Vec<u64> = ids.into_iter().take(window).collect();
        let scanned = window_ids.len();

        let results = self.scan(window_ids, query, &cancel).await;
        tracing::debug!(
            scanned,
            count = results.len(),
            cancelled = cancel.is_cancelled(),
            "HackerNews scan finished"
        );
        Ok(results)
    }

    fn platform(&self) -> Platform {
        Platform::HackerNews
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct Item {
    id: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    by: Option<String>,
    time: Option<i64>,
    title: Option<String>,
    text: Option<String>,
    url: Option<String>,
    score: Option<i64>,
    descendants: Option<i64>,
    kids: Vec<u64>,
    deleted: bool,
    dead: bool,
}

/// Case-insensitive title match: the whole query as a substring, or every
/// query keyword somewhere in the title.
pub(crate) fn title_matches(title: &str, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return false;
    }
    let title = title.to_lowercase();
    title.contains(&query) || query.split_whitespace().all(|k| title.contains(k))
}

/// Map an item to a result if it is a live story that matches the query
/// inside the date bounds.
pub(crate) fn parse_hackernews_item(item: Item, query: &PlatformQuery) -> Option<SearchResult> {
    if item.deleted || item.dead {
        return None;
    }
    if item.kind.as_deref().is_some_and(|k| k != "story" && k != "job" && k != "poll") {
        return None;
    }
    let title = item.title?;
    if !title_matches(&title, &query.text) {
        return None;
    }

    let published_at = normalize::from_unix_secs(item.time.unwrap_or(0));
    if !query.within_bounds(published_at) {
        return None;
    }

    let native_id = item.id.to_string();
    let link = item
        .url
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={native_id}"));
    let comments = match item.descendants {
        Some(n) => n.max(0).unsigned_abs(),
        None => item.kids.len() as u64,
    };

    Some(SearchResult {
        id: normalize::result_id(Platform::HackerNews, &native_id),
        title,
        snippet: normalize::truncate_snippet(item.text.as_deref()),
        source: Platform::HackerNews.label().to_string(),
        source_id: native_id,
        url: normalize::canonical_url(&link),
        published_at,
        author: item.by.unwrap_or_default(),
        engagement_count: item.score.unwrap_or(0).max(0).unsigned_abs(),
        comment_count: comments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    fn query(text: &str, max_results: usize) -> PlatformQuery {
        PlatformQuery {
            text: text.into(),
            max_results,
            from_date: None,
            to_date: None,
        }
    }

    fn story(id: u64, title: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "type": "story",
            "by": "pg",
            "time": 1_700_000_000 + id as i64,
            "title": title,
            "url": format!("https://example.com/{id}"),
            "score": 100 + id,
            "descendants": 10 + id,
            "kids": [1, 2]
        })
    }

    async fn mount_story(server: &MockServer, id: u64, title: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/item/{id}.json")))
            .respond_with(ResponseTemplate::new(200).set_body_json(story(id, title)))
            .mount(server)
            .await;
    }

    /// Serves every item after `delay`, noting when each request arrived.
    struct SlowItems {
        delay: Duration,
        arrivals: Arc<Mutex<Vec<Instant>>>,
    }

    impl Respond for SlowItems {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            self.arrivals.lock().unwrap().push(Instant::now());
            let id = request
                .url
                .path()
                .trim_start_matches("/item/")
                .trim_end_matches(".json")
                .parse()
                .unwrap();
            ResponseTemplate::new(200)
                .set_body_json(story(id, "Python packaging"))
                .set_delay(self.delay)
        }
    }

    /// Most requests that were being served at any one arrival.
    fn peak_in_flight(arrivals: &[Instant], delay: Duration) -> usize {
        arrivals
            .iter()
            .map(|&t| {
                arrivals
                    .iter()
                    .filter(|&&s| s <= t && t < s + delay)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    fn adapter(server: &MockServer, multiplier: usize, concurrency: usize) -> HackerNewsAdapter {
        let client = http::build_client(&SearchConfig::default()).expect("client");
        HackerNewsAdapter::new(client, server.uri(), multiplier, concurrency)
    }

    #[test]
    fn title_match_whole_phrase_or_all_keywords() {
        assert!(title_matches("Show HN: A Rust compiler in Rust", "rust compiler"));
        assert!(title_matches("Compiler internals, now in RUST", "rust compiler"));
        assert!(!title_matches("A Go compiler", "rust compiler"));
        assert!(!title_matches("Anything", "   "));
    }

    #[test]
    fn parse_prefers_descendants_then_kids() {
        let item: Item = serde_json::from_value(story(7, "Rust news")).expect("item");
        let result = parse_hackernews_item(item, &query("rust", 10)).expect("match");
        assert_eq!(result.id, "hackernews_7");
        assert_eq!(result.comment_count, 17);
        assert_eq!(result.engagement_count, 107);

        let item: Item = serde_json::from_value(serde_json::json!({
            "id": 8, "type": "story", "title": "Ask HN: Rust jobs?", "kids": [1, 2, 3]
        }))
        .expect("item");
        let result = parse_hackernews_item(item, &query("rust", 10)).expect("match");
        assert_eq!(result.comment_count, 3);
        assert_eq!(result.engagement_count, 0);
        assert_eq!(result.url, "https://news.ycombinator.com/item?id=8");
    }

    #[test]
    fn parse_skips_dead_comments_and_misses() {
        let dead: Item = serde_json::from_value(serde_json::json!({
            "id": 1, "type": "story", "title": "Rust", "dead": true
        }))
        .expect("item");
        assert!(parse_hackernews_item(dead, &query("rust", 10)).is_none());

        let comment: Item = serde_json::from_value(serde_json::json!({
            "id": 2, "type": "comment", "text": "rust rust rust"
        }))
        .expect("item");
        assert!(parse_hackernews_item(comment, &query("rust", 10)).is_none());

        let miss: Item = serde_json::from_value(story(3, "Go generics")).expect("item");
        assert!(parse_hackernews_item(miss, &query("rust", 10)).is_none());
    }

    #[tokio::test]
    async fn scan_filters_window_and_keeps_feed_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                11, 12, 13, 14, 15, 16, 17
            ])))
            .mount(&server)
            .await;
        mount_story(&server, 11, "Rust in the kernel").await;
        mount_story(&server, 12, "Python 4 announced").await;
        mount_story(&server, 13, "Writing an OS in Rust").await;
        mount_story(&server, 14, "Zig vs C").await;
        // Outside the 2 x 2 window.
        mount_story(&server, 15, "Rust everywhere").await;

        let results = adapter(&server, 2, 2)
            .search(&query("rust", 2), CancellationToken::new())
            .await
            .expect("results");

        let ids: Vec<&str> = results.iter().map(|r| r.source_id.as_str()).collect();
        assert_eq!(ids, vec!["11", "13"]);
    }

    #[tokio::test]
    async fn scan_keeps_item_fetches_within_concurrency() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json((1..=12).collect::<Vec<u64>>()))
            .mount(&server)
            .await;
        let delay = Duration::from_millis(150);
        let arrivals = Arc::new(Mutex::new(Vec::new()));
        Mock::given(method("GET"))
            .and(path_regex(r"^/item/\d+\.json$"))
            .respond_with(SlowItems {
                delay,
                arrivals: arrivals.clone(),
            })
            .mount(&server)
            .await;

        // Window of 4 x 2 = 8 items, two at a time.
        let results = adapter(&server, 4, 2)
            .search(&query("rust", 2), CancellationToken::new())
            .await
            .expect("results");
        assert!(results.is_empty());

        let arrivals = arrivals.lock().unwrap().clone();
        assert_eq!(arrivals.len(), 8);
        let peak = peak_in_flight(&arrivals, delay);
        assert!(peak <= 2, "{peak} item requests in flight");
        assert_eq!(peak, 2);
    }

    #[tokio::test]
    async fn scan_tolerates_failed_and_null_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2, 3])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/1.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/item/2.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("null"))
            .mount(&server)
            .await;
        mount_story(&server, 3, "Rust 2.0?").await;

        let results = adapter(&server, 5, 4)
            .search(&query("rust", 5), CancellationToken::new())
            .await
            .expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "3");
    }

    #[tokio::test]
    async fn cancelled_scan_returns_partial_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([1, 2, 3])))
            .mount(&server)
            .await;
        mount_story(&server, 1, "Rust fast path").await;
        for slow in [2u64, 3] {
            Mock::given(method("GET"))
                .and(path(format!("/item/{slow}.json")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(story(slow, "Rust slow path"))
                        .set_delay(Duration::from_secs(10)),
                )
                .mount(&server)
                .await;
        }

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let results = adapter(&server, 5, 3)
            .search(&query("rust", 3), cancel)
            .await
            .expect("partial results are not an error");

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_id, "1");
    }

    #[tokio::test]
    async fn feed_failure_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/topstories.json"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = adapter(&server, 5, 4)
            .search(&query("rust", 5), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Platform { platform: Platform::HackerNews, .. }));
    }
}
