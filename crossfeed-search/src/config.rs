//! Engine configuration with sensible defaults.
//!
//! [`SearchConfig`] controls result caps, the shared platform deadline,
//! caching, the search-less scan, circuit breaking, ranking weights, and
//! per-platform endpoints/credentials. It deserialises from the `[search]`
//! table of the service config; every field has a default.

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::orchestrator::ranking::RankingWeights;

/// Configuration for the aggregation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Result cap applied per platform when the request gives none.
    pub default_max_results: usize,
    /// Hard upper bound for a request's per-platform result cap.
    pub max_results_cap: usize,
    /// Shared deadline for all platform calls of one request, in seconds.
    /// Also used as the per-request HTTP timeout.
    pub platform_timeout_secs: u64,
    /// How long aggregated responses stay fresh. 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Upper bound on the number of cached responses.
    pub cache_max_entries: u64,
    /// The search-less scan probes `max_results * multiplier` feed items.
    pub hackernews_scan_multiplier: usize,
    /// Maximum concurrent item probes during the search-less scan.
    pub hackernews_scan_concurrency: usize,
    /// Consecutive failures before a platform's circuit opens.
    pub circuit_failure_threshold: u32,
    /// Seconds an open circuit waits before allowing a probe.
    pub circuit_cooldown_secs: u64,
    /// Custom User-Agent. Reddit rejects generic agents, so one is always sent.
    pub user_agent: Option<String>,
    /// Weights for `ranked` sort mode.
    pub ranking: RankingWeights,
    /// Endpoints and credentials per platform.
    pub platforms: PlatformSettings,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_results: 10,
            max_results_cap: 50,
            platform_timeout_secs: 8,
            cache_ttl_secs: 300,
            cache_max_entries: 1_000,
            hackernews_scan_multiplier: 5,
            hackernews_scan_concurrency: 4,
            circuit_failure_threshold: 3,
            circuit_cooldown_secs: 60,
            user_agent: None,
            ranking: RankingWeights::default(),
            platforms: PlatformSettings::default(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `default_max_results` and `max_results_cap` must be greater than 0
    /// - `default_max_results` must be <= `max_results_cap`
    /// - `platform_timeout_secs` must be greater than 0
    /// - scan multiplier and concurrency must be greater than 0
    /// - `circuit_failure_threshold` must be greater than 0
    /// - ranking weights must be finite and non-negative
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.default_max_results == 0 || self.max_results_cap == 0 {
            return Err(SearchError::Config(
                "max_results values must be greater than 0".into(),
            ));
        }
        if self.default_max_results > self.max_results_cap {
            return Err(SearchError::Config(
                "default_max_results must be <= max_results_cap".into(),
            ));
        }
        if self.platform_timeout_secs == 0 {
            return Err(SearchError::Config(
                "platform_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.hackernews_scan_multiplier == 0 || self.hackernews_scan_concurrency == 0 {
            return Err(SearchError::Config(
                "hackernews scan multiplier and concurrency must be greater than 0".into(),
            ));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(SearchError::Config(
                "circuit_failure_threshold must be greater than 0".into(),
            ));
        }
        self.ranking.validate()
    }

    /// The User-Agent sent to every platform.
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .clone()
            .unwrap_or_else(|| format!("crossfeed/{}", env!("CARGO_PKG_VERSION")))
    }
}

/// Endpoints and credentials for every platform adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    /// YouTube Data API v3.
    pub youtube: YouTubeSettings,
    /// Reddit public JSON listings.
    pub reddit: EndpointSettings,
    /// Twitter API v2.
    pub twitter: TwitterSettings,
    /// BlueSky public AppView.
    pub bluesky: EndpointSettings,
    /// HackerNews Firebase API.
    pub hackernews: EndpointSettings,
}

/// A platform that needs nothing but a base URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    /// Override for the API base URL; `None` uses the public endpoint.
    pub base_url: Option<String>,
}

/// YouTube endpoint and API key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeSettings {
    /// Override for the API base URL.
    pub base_url: Option<String>,
    /// Data API key. Without one the platform has no adapter.
    pub api_key: Option<String>,
}

/// Twitter endpoint and bearer token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterSettings {
    /// Override for the API base URL.
    pub base_url: Option<String>,
    /// App-only bearer token. Without one the platform has no adapter.
    pub bearer_token: Option<String>,
}
