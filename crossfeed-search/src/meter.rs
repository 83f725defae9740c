//! Usage accounting and entitlement gates.
//!
//! The engine does not own account state. It talks to two collaborators:
//! a [`UsageService`] that holds, records and releases credits, and an
//! [`EntitlementService`] that says whether a caller's tier includes a
//! gated platform. [`UsageMeter`] wraps both into the step the engine runs
//! before any platform is called: `authorize` checks entitlements and
//! holds the request's credits as a [`Reservation`]. The reservation is
//! committed after every satisfied request (cache hit or fresh
//! aggregation alike) and handed back if the request is abandoned.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::request::SearchRequest;
use crate::types::Platform;

/// Kinds of metered operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    /// One platform searched once.
    Search,
}

impl UsageKind {
    /// Stable identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Search => "search",
        }
    }
}

/// A caller's standing in the current usage window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaStatus {
    /// Whether the caller is still below the limit.
    pub within_limit: bool,
    /// Credits consumed this window, including credits held by requests
    /// still in flight.
    pub used: u64,
    /// Credits left this window.
    pub remaining: u64,
    /// Credits available per window.
    pub limit: u64,
    /// Start of the next window.
    pub reset_at: DateTime<Utc>,
}

impl QuotaStatus {
    /// The refusal for a request needing `requested` credits.
    pub fn exceeded(&self, requested: u64) -> SearchError {
        SearchError::QuotaExceeded {
            used: self.used,
            limit: self.limit,
            requested,
            reset_at: self.reset_at,
        }
    }
}

/// Quota lookup and usage recording.
///
/// `reserve`, `commit` and `release` have defaults built on `check_quota`
/// and `track_usage`. Those defaults do not hold credits, so two
/// concurrent requests can both pass `reserve`; a service shared across
/// requests overrides all three and checks-and-holds under one lock.
#[async_trait]
pub trait UsageService: Send + Sync {
    /// Report the caller's standing for `kind`.
    async fn check_quota(&self, user_id: &str, kind: UsageKind) -> Result<QuotaStatus>;

    /// Record `amount` credits of `kind` against the caller.
    ///
    /// `descriptor` says what was consumed, e.g. `"search:reddit,youtube"`.
    async fn track_usage(
        &self,
        user_id: &str,
        kind: UsageKind,
        descriptor: &str,
        amount: u64,
    ) -> Result<()>;

    /// Hold `amount` credits of `kind` for an in-flight request.
    ///
    /// Returns the caller's standing as checked, before the hold.
    ///
    /// # Errors
    ///
    /// [`SearchError::QuotaExceeded`] when fewer than `amount` credits
    /// remain.
    async fn reserve(&self, user_id: &str, kind: UsageKind, amount: u64) -> Result<QuotaStatus> {
        let status = self.check_quota(user_id, kind).await?;
        if status.remaining < amount {
            return Err(status.exceeded(amount));
        }
        Ok(status)
    }

    /// Turn a hold of `amount` credits into recorded usage.
    async fn commit(
        &self,
        user_id: &str,
        kind: UsageKind,
        descriptor: &str,
        amount: u64,
    ) -> Result<()> {
        self.track_usage(user_id, kind, descriptor, amount).await
    }

    /// Drop a hold of `amount` credits without recording usage.
    async fn release(&self, _user_id: &str, _kind: UsageKind, _amount: u64) -> Result<()> {
        Ok(())
    }
}

/// Tier gate for premium platforms.
#[async_trait]
pub trait EntitlementService: Send + Sync {
    /// Whether the caller's tier may search `platform`.
    async fn user_supports_platform(&self, user_id: &str, platform: Platform) -> Result<bool>;
}

/// Credits held for one in-flight request.
///
/// [`commit`](Self::commit) it once the request is satisfied. Dropping it
/// uncommitted releases the hold on the current tokio runtime.
#[must_use = "an uncommitted reservation is released when dropped"]
pub struct Reservation {
    usage: Arc<dyn UsageService>,
    user_id: String,
    kind: UsageKind,
    descriptor: String,
    amount: u64,
    status: QuotaStatus,
    settled: bool,
}

impl Reservation {
    /// The caller's standing when the credits were held.
    pub fn status(&self) -> &QuotaStatus {
        &self.status
    }

    /// Credits held.
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Record the held credits as used.
    ///
    /// # Errors
    ///
    /// Propagates the usage service's failure; the hold is released first.
    pub async fn commit(mut self) -> Result<()> {
        self.settled = true;
        let committed = self
            .usage
            .commit(&self.user_id, self.kind, &self.descriptor, self.amount)
            .await;
        if let Err(e) = committed {
            if let Err(release) = self
                .usage
                .release(&self.user_id, self.kind, self.amount)
                .await
            {
                tracing::warn!(user_id = %self.user_id, error = %release, "failed to release hold");
            }
            return Err(e);
        }
        tracing::debug!(
            user_id = %self.user_id,
            amount = self.amount,
            descriptor = %self.descriptor,
            "usage debited"
        );
        Ok(())
    }

    /// Hand the held credits back without recording usage.
    ///
    /// # Errors
    ///
    /// Propagates the usage service's failure.
    pub async fn release(mut self) -> Result<()> {
        self.settled = true;
        self.usage
            .release(&self.user_id, self.kind, self.amount)
            .await
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let usage = Arc::clone(&self.usage);
        let user_id = std::mem::take(&mut self.user_id);
        let (kind, amount) = (self.kind, self.amount);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = usage.release(&user_id, kind, amount).await {
                        tracing::warn!(user_id = %user_id, error = %e, "failed to release hold");
                    }
                });
            }
            Err(_) => {
                tracing::warn!(user_id = %user_id, amount, "hold dropped outside a runtime");
            }
        }
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("user_id", &self.user_id)
            .field("descriptor", &self.descriptor)
            .field("amount", &self.amount)
            .field("settled", &self.settled)
            .finish_non_exhaustive()
    }
}

/// Pre-flight checks for one engine.
#[derive(Clone)]
pub struct UsageMeter {
    usage: Arc<dyn UsageService>,
    entitlements: Arc<dyn EntitlementService>,
}

impl UsageMeter {
    /// Create a meter over the two collaborators.
    pub fn new(usage: Arc<dyn UsageService>, entitlements: Arc<dyn EntitlementService>) -> Self {
        Self {
            usage,
            entitlements,
        }
    }

    /// Refuse the request before any platform is called if the caller
    /// may not use a requested gated platform, or has fewer credits left
    /// than the request costs. Otherwise hold one credit per validated
    /// platform until the returned reservation is committed or dropped.
    ///
    /// # Errors
    ///
    /// [`SearchError::Entitlement`] for the first disallowed gated
    /// platform; [`SearchError::QuotaExceeded`] when `remaining < cost`;
    /// any collaborator error unchanged.
    pub async fn authorize(&self, user_id: &str, request: &SearchRequest) -> Result<Reservation> {
        for &platform in request.platforms.iter().filter(|p| p.is_gated()) {
            if !self
                .entitlements
                .user_supports_platform(user_id, platform)
                .await?
            {
                tracing::info!(user_id, platform = %platform, "gated platform refused");
                return Err(SearchError::Entitlement { platform });
            }
        }

        let cost = request.cost();
        let status = match self.usage.reserve(user_id, UsageKind::Search, cost).await {
            Ok(status) => status,
            Err(e) => {
                if let SearchError::QuotaExceeded { used, limit, .. } = &e {
                    tracing::info!(user_id, used, limit, requested = cost, "quota exceeded");
                }
                return Err(e);
            }
        };

        Ok(Reservation {
            usage: Arc::clone(&self.usage),
            user_id: user_id.to_owned(),
            kind: UsageKind::Search,
            descriptor: descriptor(request),
            amount: cost,
            status,
            settled: false,
        })
    }
}

impl std::fmt::Debug for UsageMeter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageMeter").finish_non_exhaustive()
    }
}

/// `"search:<canonical platform ids>"`.
fn descriptor(request: &SearchRequest) -> String {
    let ids: Vec<&str> = request
        .canonical_platforms()
        .iter()
        .map(|p| p.id())
        .collect();
    format!("{}:{}", UsageKind::Search.id(), ids.join(","))
}
