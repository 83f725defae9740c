//! TTL-bounded response cache shared by concurrent requests.
//!
//! Stores whole [`SearchResponse`] values keyed by a SHA-256 digest of the
//! normalised request. Uses [`moka`] as the concurrent map and capacity
//! bound; freshness is judged against the injected [`Clock`] so that
//! `now - cached_at < ttl` holds exactly.
//!
//! Expired entries are treated as misses and evicted on the read that
//! finds them, or in bulk by [`ResponseCache::sweep`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use sha2::{Digest, Sha256};

use crate::clock::Clock;
use crate::request::SearchRequest;
use crate::types::SearchResponse;

/// Deterministic cache key: hex SHA-256 over the normalised request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build the key for a validated request.
    ///
    /// The query is lowercased and the platform set is sorted into
    /// canonical order before hashing, so requests differing only in
    /// platform order or query case share an entry.
    pub fn for_request(request: &SearchRequest) -> Self {
        let platforms: Vec<&str> = request
            .canonical_platforms()
            .iter()
            .map(|p| p.id())
            .collect();

        let mut hasher = Sha256::new();
        for field in [
            request.query.to_lowercase(),
            platforms.join(","),
            request.from_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            request.to_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            request.max_results.to_string(),
            request.sort_mode.id().to_owned(),
            request.page.to_string(),
        ] {
            hasher.update(field.as_bytes());
            // Field separator so ("ab", "c") and ("a", "bc") differ.
            hasher.update([0x1f]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A cached response and the instant it was aggregated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached response.
    pub response: Arc<SearchResponse>,
    /// When the response was aggregated.
    pub cached_at: DateTime<Utc>,
}

/// Concurrent TTL cache of aggregated responses.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Cache<CacheKey, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Create a cache holding at most `max_entries` responses for `ttl_secs`.
    ///
    /// A TTL of 0 disables caching: every read misses.
    pub fn new(ttl_secs: u64, max_entries: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_entries).build(),
            ttl: i64::try_from(ttl_secs)
                .ok()
                .and_then(Duration::try_seconds)
                .unwrap_or(Duration::MAX),
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(entry.cached_at) < self.ttl
    }

    /// Look up a fresh response.
    ///
    /// Returns `None` on a miss or when the entry has outlived the TTL;
    /// in the latter case the stale entry is evicted.
    pub async fn get(&self, key: &CacheKey) -> Option<SearchResponse> {
        let entry = self.entries.get(key).await?;
        let now = self.clock.now();
        if self.is_fresh(&entry, now) {
            return Some((*entry.response).clone());
        }
        self.evict_if_stale(key, now).await;
        None
    }

    /// Insert or replace the response for `key`.
    pub async fn put(&self, key: CacheKey, response: SearchResponse) {
        if self.ttl <= Duration::zero() {
            return;
        }
        let entry = CacheEntry {
            cached_at: response.cached_at,
            response: Arc::new(response),
        };
        self.entries.insert(key, entry).await;
    }

    /// Remove every entry older than the TTL.
    ///
    /// Returns the number of entries removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let stale: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_fresh(entry, now))
            .map(|(key, _)| key)
            .collect();

        let mut removed = 0;
        for key in stale {
            if self.evict_if_stale(&key, now).await {
                removed += 1;
            }
        }
        self.entries.run_pending_tasks().await;
        tracing::debug!(removed, remaining = self.entries.entry_count(), "cache swept");
        removed
    }

    /// Approximate number of cached responses.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Whether the cache currently holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically remove `key` only if its current entry is still stale,
    /// so a concurrent refresh is never thrown away.
    async fn evict_if_stale(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        let ttl = self.ttl;
        let outcome = self
            .entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if now.signed_duration_since(entry.value().cached_at) >= ttl => {
                        Op::Remove
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        matches!(outcome, CompResult::Removed(_))
    }
}
