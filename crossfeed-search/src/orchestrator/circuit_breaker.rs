//! Per-platform circuit breaker.
//!
//! Tracks consecutive failures per platform and temporarily skips
//! platforms that keep failing, so a dead upstream does not cost every
//! request a full timeout. After a cooldown a tripped platform enters a
//! half-open state where one probe decides whether to restore it.
//!
//! # State Machine
//!
//! ```text
//! ┌────────┐  N failures   ┌────────┐  cooldown   ┌──────────┐
//! │ Closed ├──────────────►│  Open  ├────────────►│ HalfOpen │
//! └───▲────┘               └────────┘             └────┬─────┘
//!     │                         ▲                      │
//!     │  success                │  failure              │
//!     └─────────────────────────┴──────────────────────┘
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::types::Platform;

/// Circuit state for a single platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy; calls go through.
    Closed,
    /// Failed too often; calls are skipped until the cooldown expires.
    Open,
    /// Cooldown elapsed; the next call is a probe.
    HalfOpen,
}

#[derive(Debug, Clone)]
struct PlatformHealth {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

impl Default for PlatformHealth {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
        }
    }
}

/// Independent health tracking for every platform.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    platforms: HashMap<Platform, PlatformHealth>,
}

impl CircuitBreaker {
    /// Trip after `failure_threshold` consecutive failures; probe again
    /// after `cooldown`.
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold,
            cooldown,
            platforms: HashMap::new(),
        }
    }

    /// Record a successful call. Closes the circuit.
    pub fn record_success(&mut self, platform: Platform) {
        let health = self.platforms.entry(platform).or_default();
        health.state = CircuitState::Closed;
        health.consecutive_failures = 0;
    }

    /// Record a failed call. Opens the circuit at the threshold.
    pub fn record_failure(&mut self, platform: Platform) {
        let health = self.platforms.entry(platform).or_default();
        health.consecutive_failures += 1;
        health.last_failure_at = Some(Instant::now());

        if health.consecutive_failures >= self.failure_threshold
            || health.state == CircuitState::HalfOpen
        {
            health.state = CircuitState::Open;
        }
    }

    /// Whether a call to `platform` should be attempted now.
    ///
    /// An open circuit whose cooldown has elapsed moves to half-open and
    /// allows the call.
    pub fn should_attempt(&mut self, platform: Platform) -> bool {
        let health = self.platforms.entry(platform).or_default();

        match health.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooldown_elapsed = health
                    .last_failure_at
                    .is_none_or(|t| t.elapsed() >= self.cooldown);

                if cooldown_elapsed {
                    health.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Current state for `platform`; untracked platforms are closed.
    pub fn state(&self, platform: Platform) -> CircuitState {
        self.platforms
            .get(&platform)
            .map_or(CircuitState::Closed, |h| h.state)
    }

    /// `(platform, state, consecutive_failures)` for every tracked platform.
    pub fn health_report(&self) -> Vec<(Platform, CircuitState, u32)> {
        let mut report: Vec<_> = self
            .platforms
            .iter()
            .map(|(platform, health)| (*platform, health.state, health.consecutive_failures))
            .collect();
        report.sort_by_key(|(platform, _, _)| *platform);
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(threshold: u32, cooldown_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(threshold, Duration::from_secs(cooldown_secs))
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = make_breaker(3, 60);
        assert_eq!(breaker.state(Platform::Reddit), CircuitState::Closed);
        assert_eq!(breaker.state(Platform::HackerNews), CircuitState::Closed);
    }

    #[test]
    fn stays_closed_below_threshold() {
        let mut breaker = make_breaker(3, 60);
        breaker.record_failure(Platform::Reddit);
        breaker.record_failure(Platform::Reddit);
        assert_eq!(breaker.state(Platform::Reddit), CircuitState::Closed);
        assert!(breaker.should_attempt(Platform::Reddit));
    }

    #[test]
    fn open_blocks_attempts() {
        let mut breaker = make_breaker(3, 600);
        for _ in 0..3 {
            breaker.record_failure(Platform::YouTube);
        }
        assert_eq!(breaker.state(Platform::YouTube), CircuitState::Open);
        assert!(!breaker.should_attempt(Platform::YouTube));
    }

    #[test]
    fn open_transitions_to_half_open_after_cooldown() {
        let mut breaker = make_breaker(3, 0);
        for _ in 0..3 {
            breaker.record_failure(Platform::BlueSky);
        }
        assert!(breaker.should_attempt(Platform::BlueSky));
        assert_eq!(breaker.state(Platform::BlueSky), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_restores_closed() {
        let mut breaker = make_breaker(3, 0);
        for _ in 0..3 {
            breaker.record_failure(Platform::Twitter);
        }
        let _ = breaker.should_attempt(Platform::Twitter);
        breaker.record_success(Platform::Twitter);
        assert_eq!(breaker.state(Platform::Twitter), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_retrips_immediately() {
        let mut breaker = make_breaker(3, 0);
        for _ in 0..3 {
            breaker.record_failure(Platform::Reddit);
        }
        let _ = breaker.should_attempt(Platform::Reddit);
        assert_eq!(breaker.state(Platform::Reddit), CircuitState::HalfOpen);
        breaker.record_failure(Platform::Reddit);
        assert_eq!(breaker.state(Platform::Reddit), CircuitState::Open);
    }

    #[test]
    fn platforms_are_independent() {
        let mut breaker = make_breaker(2, 60);
        breaker.record_failure(Platform::Reddit);
        breaker.record_failure(Platform::Reddit);
        assert_eq!(breaker.state(Platform::Reddit), CircuitState::Open);
        assert_eq!(breaker.state(Platform::YouTube), CircuitState::Closed);
        assert!(breaker.should_attempt(Platform::YouTube));
    }

    #[test]
    fn alternating_success_never_trips() {
        let mut breaker = make_breaker(3, 60);
        for _ in 0..10 {
            breaker.record_failure(Platform::HackerNews);
            breaker.record_success(Platform::HackerNews);
        }
        assert_eq!(breaker.state(Platform::HackerNews), CircuitState::Closed);
    }

    #[test]
    fn health_report_lists_tracked_platforms_in_order() {
        let mut breaker = make_breaker(3, 60);
        breaker.record_failure(Platform::HackerNews);
        breaker.record_success(Platform::YouTube);

        let report = breaker.health_report();
        assert_eq!(
            report,
            vec![
                (Platform::YouTube, CircuitState::Closed, 0),
                (Platform::HackerNews, CircuitState::Closed, 1),
            ]
        );
    }
}
