//! Concurrent per-platform fan-out with failure isolation.
//!
//! One tokio task per requested platform, all joined before the merge.
//! Every unit runs under a child of the caller's cancellation token; when
//! the deadline passes that child is cancelled and the orchestrator still
//! waits for every unit, so adapters that can return partial results do.
//!
//! Anything that goes wrong inside a unit (adapter error, missing
//! adapter, open circuit, panic) resolves to an empty list for that
//! platform only.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::error::SearchError;
use crate::platform::{PlatformAdapter, PlatformQuery, PlatformRegistry};
use crate::request::SearchRequest;
use crate::types::{Platform, SearchResult};

use super::circuit_breaker::CircuitBreaker;

/// Fans a validated request out to every requested platform.
#[derive(Debug)]
pub struct Orchestrator {
    registry: PlatformRegistry,
    breaker: Arc<Mutex<CircuitBreaker>>,
    deadline: Duration,
}

impl Orchestrator {
    /// Create an orchestrator over `registry`.
    ///
    /// `deadline` bounds the whole fan-out; `breaker` is owned by this
    /// orchestrator alone.
    pub fn new(registry: PlatformRegistry, breaker: CircuitBreaker, deadline: Duration) -> Self {
        Self {
            registry,
            breaker: Arc::new(Mutex::new(breaker)),
            deadline,
        }
    }

    /// The adapters this orchestrator dispatches to.
    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    /// Current circuit state of every platform that has been called.
    pub fn circuit_report(&self) -> Vec<(Platform, super::CircuitState, u32)> {
        lock(&self.breaker).health_report()
    }

    /// Search every platform in `request` concurrently.
    ///
    /// Returns one `(platform, results)` pair per requested platform, in
    /// request order. Never fails: a platform that errors contributes an
    /// empty list.
    pub async fn fan_out(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Vec<(Platform, Vec<SearchResult>)> {
        let scope = cancel.child_token();
        // Abandoning the fan-out (caller dropped) stops every unit.
        let _scope_guard = scope.clone().drop_guard();
        let query = PlatformQuery::from(request);

        let units: Vec<_> = request
            .platforms
            .iter()
            .map(|&platform| {
                let adapter = self.registry.get(platform);
                let breaker = Arc::clone(&self.breaker);
                let query = query.clone();
                let token = scope.clone();
                tokio::spawn(async move { run_unit(platform, adapter, breaker, query, token).await })
            })
            .collect();

        let joined = futures::future::join_all(units);
        tokio::pin!(joined);

        let outcomes = tokio::select! {
            outcomes = &mut joined => outcomes,
            () = tokio::time::sleep(self.deadline) => {
                tracing::warn!(
                    deadline_ms = self.deadline.as_millis() as u64,
                    "platform deadline reached, cancelling outstanding searches"
                );
                scope.cancel();
                joined.await
            }
        };

        request
            .platforms
            .iter()
            .copied()
            .zip(outcomes)
            .map(|(platform, outcome)| match outcome {
                Ok(results) => (platform, results),
                Err(e) => {
                    tracing::error!(platform = %platform, error = %e, "platform task aborted");
                    (platform, Vec::new())
                }
            })
            .collect()
    }
}

/// One platform's unit of work. Always yields a list.
async fn run_unit(
    platform: Platform,
    adapter: Option<Arc<dyn PlatformAdapter>>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    query: PlatformQuery,
    cancel: CancellationToken,
) -> Vec<SearchResult> {
    let Some(adapter) = adapter else {
        tracing::warn!(platform = %platform, "no adapter configured for platform");
        return Vec::new();
    };

    if !lock(&breaker).should_attempt(platform) {
        tracing::warn!(platform = %platform, "circuit open, skipping platform");
        return Vec::new();
    }

    let started = Instant::now();
    match adapter.search(&query, cancel).await {
        Ok(results) => {
            lock(&breaker).record_success(platform);
            tracing::debug!(
                platform = %platform,
                count = results.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "platform returned results"
            );
            results
        }
        Err(SearchError::Cancelled) => {
            tracing::warn!(platform = %platform, "platform search cancelled");
            Vec::new()
        }
        Err(e) => {
            lock(&breaker).record_failure(platform);
            tracing::warn!(platform = %platform, error = %e, "platform search failed");
            Vec::new()
        }
    }
}

fn lock(breaker: &Mutex<CircuitBreaker>) -> MutexGuard<'_, CircuitBreaker> {
    breaker.lock().unwrap_or_else(|e| e.into_inner())
}
