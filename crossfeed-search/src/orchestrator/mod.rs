//! Search orchestrator: concurrent fan-out, failure isolation, merge.
//!
//! This module fans a validated request out to every requested platform
//! concurrently, keeps failing platforms from affecting the others (and
//! from being called at all while their circuit is open), then merges
//! the per-platform lists into one ordered result set.

pub mod circuit_breaker;
pub mod fanout;
pub mod ranking;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use fanout::Orchestrator;
pub use ranking::{merge, relevance_score, RankingWeights};
