//! The per-platform client contract.
//!
//! Each platform (YouTube, Reddit, Twitter, BlueSky, HackerNews)
//! implements [`PlatformAdapter`] to give the orchestrator one uniform
//! call: a query plus constraints in, normalised results out. Adapters
//! are registered in a [`PlatformRegistry`] and shared across requests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SearchError};
use crate::request::SearchRequest;
use crate::types::{Platform, SearchResult};

/// What every adapter is asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformQuery {
    /// Normalised free-text query.
    pub text: String,
    /// Maximum results this platform may contribute.
    pub max_results: usize,
    /// Lower publication bound.
    pub from_date: Option<DateTime<Utc>>,
    /// Upper publication bound.
    pub to_date: Option<DateTime<Utc>>,
}

impl PlatformQuery {
    /// Whether `published` falls inside the requested date bounds.
    pub fn within_bounds(&self, published: DateTime<Utc>) -> bool {
        self.from_date.is_none_or(|from| published >= from)
            && self.to_date.is_none_or(|to| published <= to)
    }
}

impl From<&SearchRequest> for PlatformQuery {
    fn from(request: &SearchRequest) -> Self {
        Self {
            text: request.query.clone(),
            max_results: request.max_results,
            from_date: request.from_date,
            to_date: request.to_date,
        }
    }
}

/// A platform search client.
///
/// Implementations own their URL construction, auth, native response
/// types, and mapping through [`crate::normalize`]. They must observe
/// `cancel`: a native-search adapter returns [`SearchError::Cancelled`]
/// when it fires, a scanning adapter returns what it has found so far.
///
/// All implementations must be `Send + Sync`; one instance serves many
/// concurrent requests.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    /// Search this platform.
    ///
    /// # Errors
    ///
    /// Any transport, status, auth, or parse failure. The orchestrator
    /// recovers every error locally as an empty result list.
    async fn search(
        &self,
        query: &PlatformQuery,
        cancel: CancellationToken,
    ) -> Result<Vec<SearchResult>>;

    /// Which platform this adapter serves.
    fn platform(&self) -> Platform;
}

/// Race `fut` against `cancel`, reporting [`SearchError::Cancelled`] if
/// the token fires first.
pub(crate) async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SearchError::Cancelled),
        outcome = fut => outcome,
    }
}

/// Adapters available to the orchestrator, keyed by platform.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    adapters: HashMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for its platform.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) {
        self.adapters.insert(adapter.platform(), adapter);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, adapter: Arc<dyn PlatformAdapter>) -> Self {
        self.register(adapter);
        self
    }

    /// The adapter for `platform`, if one is registered.
    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform).cloned()
    }

    /// Registered platforms in canonical order.
    pub fn platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<_> = self.adapters.keys().copied().collect();
        platforms.sort();
        platforms
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
