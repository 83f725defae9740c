//! In-memory account store.
//!
//! Resolves each caller to a tier from [`AccountsConfig`], keeps a usage
//! counter per caller per calendar month (UTC), and answers the engine's
//! quota and entitlement questions. Credits held by in-flight requests
//! count against the quota until they are committed or released, and the
//! check and the hold happen under one lock. Counters live for the life of
//! the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use crossfeed_search::{
    Clock, EntitlementService, Platform, QuotaStatus, SearchError, SystemClock, UsageKind,
    UsageService,
};

use crate::config::{AccountsConfig, TierConfig};

#[derive(Debug, Clone, Copy)]
struct Usage {
    window_start: DateTime<Utc>,
    used: u64,
    held: u64,
}

impl Usage {
    fn fresh(window_start: DateTime<Utc>) -> Self {
        Self {
            window_start,
            used: 0,
            held: 0,
        }
    }

    fn committed_and_held(&self) -> u64 {
        self.used.saturating_add(self.held)
    }
}

/// Tier lookup plus monthly usage counters.
#[derive(Debug)]
pub struct AccountStore {
    config: AccountsConfig,
    clock: Arc<dyn Clock>,
    usage: Mutex<HashMap<(String, UsageKind), Usage>>,
}

impl AccountStore {
    /// Store over `config`, on the system clock.
    pub fn new(config: AccountsConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Store over `config` with an explicit clock.
    pub fn with_clock(config: AccountsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            usage: Mutex::new(HashMap::new()),
        }
    }

    /// Name of the tier `user_id` belongs to.
    pub fn tier_name(&self, user_id: &str) -> &str {
        self.config
            .users
            .get(user_id)
            .map_or(self.config.default_tier.as_str(), String::as_str)
    }

    fn tier(&self, user_id: &str) -> Result<&TierConfig, SearchError> {
        let name = self.tier_name(user_id);
        self.config
            .tiers
            .get(name)
            .ok_or_else(|| SearchError::Unexpected(format!("tier '{name}' is not defined")))
    }

    /// Cheapest tier whose plan includes `platform`, if any.
    pub fn required_tier_for(&self, platform: Platform) -> Option<String> {
        self.config
            .tiers
            .iter()
            .filter(|(_, tier)| !platform.is_gated() || tier.gated_platforms.contains(&platform))
            .min_by_key(|(_, tier)| tier.monthly_credits)
            .map(|(name, _)| name.clone())
    }

    /// Credits `user_id` has committed in the current window.
    pub fn used(&self, user_id: &str, kind: UsageKind) -> u64 {
        self.current(user_id, kind).used
    }

    /// Credits held for `user_id` by requests still in flight.
    pub fn held(&self, user_id: &str, kind: UsageKind) -> u64 {
        self.current(user_id, kind).held
    }

    fn current(&self, user_id: &str, kind: UsageKind) -> Usage {
        let window = window_start(self.clock.now());
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage
            .get(&(user_id.to_owned(), kind))
            .filter(|u| u.window_start == window)
            .copied()
            .unwrap_or_else(|| Usage::fresh(window))
    }

    /// Run `f` on the caller's counters for the current window, resetting
    /// them first if the window has rolled over.
    fn with_usage<T>(&self, user_id: &str, kind: UsageKind, f: impl FnOnce(&mut Usage) -> T) -> T {
        let window = window_start(self.clock.now());
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        let entry = usage
            .entry((user_id.to_owned(), kind))
            .or_insert_with(|| Usage::fresh(window));
        if entry.window_start != window {
            *entry = Usage::fresh(window);
        }
        f(entry)
    }

    fn status(limit: u64, usage: &Usage, now: DateTime<Utc>) -> QuotaStatus {
        let used = usage.committed_and_held();
        QuotaStatus {
            within_limit: used < limit,
            used,
            remaining: limit.saturating_sub(used),
            limit,
            reset_at: next_window_start(now),
        }
    }
}

#[async_trait]
impl UsageService for AccountStore {
    async fn check_quota(&self, user_id: &str, kind: UsageKind) -> Result<QuotaStatus, SearchError> {
        let limit = self.tier(user_id)?.monthly_credits;
        let now = self.clock.now();
        Ok(Self::status(limit, &self.current(user_id, kind), now))
    }

    async fn track_usage(
        &self,
        user_id: &str,
        kind: UsageKind,
        descriptor: &str,
        amount: u64,
    ) -> Result<(), SearchError> {
        let used = self.with_usage(user_id, kind, |entry| {
            entry.used = entry.used.saturating_add(amount);
            entry.used
        });
        tracing::debug!(
            user_id,
            kind = kind.id(),
            descriptor,
            amount,
            used,
            "usage recorded"
        );
        Ok(())
    }

    async fn reserve(
        &self,
        user_id: &str,
        kind: UsageKind,
        amount: u64,
    ) -> Result<QuotaStatus, SearchError> {
        let limit = self.tier(user_id)?.monthly_credits;
        let now = self.clock.now();
        let status = self.with_usage(user_id, kind, |entry| {
            let status = Self::status(limit, entry, now);
            if status.remaining >= amount {
                entry.held = entry.held.saturating_add(amount);
            }
            status
        });
        if status.remaining < amount {
            return Err(status.exceeded(amount));
        }
        tracing::trace!(user_id, kind = kind.id(), amount, "credits held");
        Ok(status)
    }

    async fn commit(
        &self,
        user_id: &str,
        kind: UsageKind,
        descriptor: &str,
        amount: u64,
    ) -> Result<(), SearchError> {
        // Holds do not survive a rollover; a late commit lands in the new window.
        let used = self.with_usage(user_id, kind, |entry| {
            entry.held = entry.held.saturating_sub(amount);
            entry.used = entry.used.saturating_add(amount);
            entry.used
        });
        tracing::debug!(
            user_id,
            kind = kind.id(),
            descriptor,
            amount,
            used,
            "usage recorded"
        );
        Ok(())
    }

    async fn release(&self, user_id: &str, kind: UsageKind, amount: u64) -> Result<(), SearchError> {
        self.with_usage(user_id, kind, |entry| {
            entry.held = entry.held.saturating_sub(amount);
        });
        tracing::trace!(user_id, kind = kind.id(), amount, "credits released");
        Ok(())
    }
}

#[async_trait]
impl EntitlementService for AccountStore {
    async fn user_supports_platform(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<bool, SearchError> {
        if !platform.is_gated() {
            return Ok(true);
        }
        Ok(self.tier(user_id)?.gated_platforms.contains(&platform))
    }
}

/// First instant of the calendar month containing `now`.
fn window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    month_start(now.year(), now.month()).unwrap_or(now)
}

/// First instant of the calendar month after the one containing `now`.
fn next_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    month_start(year, month).unwrap_or(now)
}

fn month_start(year: i32, month: u32) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use chrono::Duration;
    use crossfeed_search::ManualClock;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn store_at(start: &str) -> (AccountStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(at(start)));
        let mut config = AccountsConfig::default();
        config.users.insert("alice".into(), "pro".into());
        (AccountStore::with_clock(config, clock.clone()), clock)
    }

    #[test]
    fn window_bounds_follow_calendar_months() {
        let now = at("2025-06-15T08:30:00Z");
        assert_eq!(window_start(now), at("2025-06-01T00:00:00Z"));
        assert_eq!(next_window_start(now), at("2025-07-01T00:00:00Z"));

        let december = at("2025-12-31T23:59:59Z");
        assert_eq!(next_window_start(december), at("2026-01-01T00:00:00Z"));
    }

    #[test]
    fn users_resolve_to_tiers() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        assert_eq!(store.tier_name("alice"), "pro");
        assert_eq!(store.tier_name("anonymous"), "free");
    }

    #[test]
    fn required_tier_is_cheapest_that_includes_platform() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        assert_eq!(store.required_tier_for(Platform::Twitter).as_deref(), Some("pro"));
        assert_eq!(store.required_tier_for(Platform::Reddit).as_deref(), Some("free"));
    }

    #[tokio::test]
    async fn quota_reflects_tracked_usage() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        store
            .track_usage("bob", UsageKind::Search, "search:reddit,youtube", 2)
            .await
            .unwrap();
        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert_eq!(status.used, 2);
        assert_eq!(status.limit, 100);
        assert_eq!(status.remaining, 98);
        assert!(status.within_limit);
        assert_eq!(status.reset_at, at("2025-07-01T00:00:00Z"));

        let other = store.check_quota("carol", UsageKind::Search).await.unwrap();
        assert_eq!(other.used, 0);
    }

    #[tokio::test]
    async fn usage_resets_at_month_boundary() {
        let (store, clock) = store_at("2025-06-30T23:59:00Z");
        store
            .track_usage("bob", UsageKind::Search, "search:reddit", 100)
            .await
            .unwrap();
        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert!(!status.within_limit);
        assert_eq!(status.remaining, 0);

        clock.advance(Duration::minutes(2));
        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert_eq!(status.used, 0);
        assert_eq!(status.reset_at, at("2025-08-01T00:00:00Z"));

        store
            .track_usage("bob", UsageKind::Search, "search:reddit", 1)
            .await
            .unwrap();
        assert_eq!(store.used("bob", UsageKind::Search), 1);
    }

    #[tokio::test]
    async fn gated_platforms_follow_tier() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        assert!(store
            .user_supports_platform("alice", Platform::Twitter)
            .await
            .unwrap());
        assert!(!store
            .user_supports_platform("bob", Platform::Twitter)
            .await
            .unwrap());
        assert!(store
            .user_supports_platform("bob", Platform::HackerNews)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn held_credits_count_until_released() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        store.reserve("bob", UsageKind::Search, 40).await.unwrap();

        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert_eq!(status.used, 40);
        assert_eq!(status.remaining, 60);
        assert_eq!(store.used("bob", UsageKind::Search), 0);
        assert_eq!(store.held("bob", UsageKind::Search), 40);

        let err = store.reserve("bob", UsageKind::Search, 61).await.unwrap_err();
        assert!(matches!(
            err,
            SearchError::QuotaExceeded {
                used: 40,
                limit: 100,
                requested: 61,
                ..
            }
        ));
        assert_eq!(store.held("bob", UsageKind::Search), 40);

        store.release("bob", UsageKind::Search, 40).await.unwrap();
        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert_eq!(status.remaining, 100);
    }

    #[tokio::test]
    async fn commit_moves_held_credits_to_used() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        store.reserve("bob", UsageKind::Search, 3).await.unwrap();
        store
            .commit("bob", UsageKind::Search, "search:youtube,reddit,hackernews", 3)
            .await
            .unwrap();
        assert_eq!(store.used("bob", UsageKind::Search), 3);
        assert_eq!(store.held("bob", UsageKind::Search), 0);
        let status = store.check_quota("bob", UsageKind::Search).await.unwrap();
        assert_eq!(status.remaining, 97);
    }

    #[tokio::test]
    async fn concurrent_reservations_cannot_overdraw() {
        let (store, _) = store_at("2025-06-15T00:00:00Z");
        let store = Arc::new(store);
        store.track_usage("bob", UsageKind::Search, "search:reddit", 97).await.unwrap();

        let (a, b) = tokio::join!(
            store.reserve("bob", UsageKind::Search, 3),
            store.reserve("bob", UsageKind::Search, 3),
        );
        assert_eq!(usize::from(a.is_ok()) + usize::from(b.is_ok()), 1);
        assert_eq!(store.held("bob", UsageKind::Search), 3);
    }

    #[tokio::test]
    async fn holds_do_not_survive_month_rollover() {
        let (store, clock) = store_at("2025-06-30T23:59:00Z");
        store.reserve("bob", UsageKind::Search, 5).await.unwrap();
        clock.advance(Duration::minutes(2));
        assert_eq!(store.held("bob", UsageKind::Search), 0);

        store
            .commit("bob", UsageKind::Search, "search:reddit", 5)
            .await
            .unwrap();
        assert_eq!(store.used("bob", UsageKind::Search), 5);
        assert_eq!(store.held("bob", UsageKind::Search), 0);
    }
}
