//! End-to-end aggregated search.
//!
//! [`SearchEngine`] ties the pieces together for one request:
//!
//! 1. Validate and normalise the raw body
//! 2. Refuse gated platforms and insufficient quota before any upstream call
//! 3. Serve from the response cache when fresh
//! 4. Otherwise fan out, merge and rank, then cache the response
//! 5. Debit one credit per validated platform, hit or miss

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::cache::{CacheKey, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::SearchConfig;
use crate::error::Result;
use crate::meter::UsageMeter;
use crate::orchestrator::{self, CircuitBreaker, CircuitState, Orchestrator};
use crate::platform::PlatformRegistry;
use crate::platforms;
use crate::request::{SearchRequest, SearchRequestBody};
use crate::types::{Platform, SearchResponse};

/// The aggregation engine. Share one instance across all requests.
#[derive(Debug)]
pub struct SearchEngine {
    config: SearchConfig,
    orchestrator: Orchestrator,
    cache: ResponseCache,
    meter: UsageMeter,
    clock: Arc<dyn Clock>,
}

impl SearchEngine {
    /// Build an engine with the real platform adapters from `config`.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`](crate::SearchError::Config) if `config` is
    /// invalid, [`SearchError::Http`](crate::SearchError::Http) if the HTTP
    /// client cannot be built.
    pub fn from_config(config: SearchConfig, meter: UsageMeter) -> Result<Self> {
        config.validate()?;
        let registry = platforms::default_registry(&config)?;
        Self::new(config, registry, meter)
    }

    /// Build an engine over an explicit adapter registry.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`](crate::SearchError::Config) if `config` is
    /// invalid.
    pub fn new(config: SearchConfig, registry: PlatformRegistry, meter: UsageMeter) -> Result<Self> {
        Self::with_clock(config, registry, meter, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an injected clock.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`](crate::SearchError::Config) if `config` is
    /// invalid.
    pub fn with_clock(
        config: SearchConfig,
        registry: PlatformRegistry,
        meter: UsageMeter,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let breaker = CircuitBreaker::new(
            config.circuit_failure_threshold,
            Duration::from_secs(config.circuit_cooldown_secs),
        );
        let orchestrator = Orchestrator::new(
            registry,
            breaker,
            Duration::from_secs(config.platform_timeout_secs),
        );
        let cache = ResponseCache::new(
            config.cache_ttl_secs,
            config.cache_max_entries,
            Arc::clone(&clock),
        );

        Ok(Self {
            config,
            orchestrator,
            cache,
            meter,
            clock,
        })
    }

    /// Serve one search for `user_id`.
    ///
    /// `cancel` is the caller's cancellation signal; it is threaded to
    /// every platform call.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`](crate::SearchError::Validation): blank
    ///   query, no known platform, inverted date range
    /// - [`SearchError::Entitlement`](crate::SearchError::Entitlement): a
    ///   gated platform outside the caller's tier
    /// - [`SearchError::QuotaExceeded`](crate::SearchError::QuotaExceeded):
    ///   fewer credits left than platforms requested
    /// - any usage-service failure
    ///
    /// Individual platform failures never surface here; they only shorten
    /// the result list.
    pub async fn search(
        &self,
        user_id: &str,
        body: SearchRequestBody,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let request = SearchRequest::from_body(body, &self.config)?;
        tracing::trace!(query = %request.query, "search request");

        // Dropping the reservation before commit hands its credits back.
        let reservation = self.meter.authorize(user_id, &request).await?;

        let key = CacheKey::for_request(&request);
        if let Some(mut cached) = self.cache.get(&key).await {
            tracing::debug!(key = key.as_str(), "cache hit");
            cached.query = request.query.clone();
            cached.platforms_searched = request.platforms.clone();
            reservation.commit().await?;
            return Ok(cached);
        }

        let response = self.aggregate(&request, cancel).await;
        self.cache.put(key, response.clone()).await;
        reservation.commit().await?;

        tracing::info!(
            platforms = request.platforms.len(),
            results = response.total_count,
            "search aggregated"
        );
        Ok(response)
    }

    async fn aggregate(&self, request: &SearchRequest, cancel: &CancellationToken) -> SearchResponse {
        let outcomes = self.orchestrator.fan_out(request, cancel).await;
        let now = self.clock.now();

        let per_platform = outcomes.into_iter().map(|(_, results)| results).collect();
        let results = orchestrator::merge(per_platform, request.sort_mode, now, &self.config.ranking);

        SearchResponse {
            total_count: results.len(),
            page_size: results.len(),
            results,
            page: request.page,
            cached_at: now,
            query: request.query.clone(),
            platforms_searched: request.platforms.clone(),
        }
    }

    /// Drop every expired cache entry; returns how many were removed.
    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep().await
    }

    /// Approximate number of cached responses.
    pub fn cache_len(&self) -> u64 {
        self.cache.len()
    }

    /// Circuit state of every platform called so far.
    pub fn circuit_report(&self) -> Vec<(Platform, CircuitState, u32)> {
        self.orchestrator.circuit_report()
    }

    /// Platforms with a registered adapter.
    pub fn available_platforms(&self) -> Vec<Platform> {
        self.orchestrator.registry().platforms()
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}
