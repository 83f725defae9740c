//! # crossfeed-search
//!
//! Concurrent multi-platform search aggregation for crossfeed.
//!
//! One query is fanned out to YouTube, Reddit, Twitter, BlueSky and
//! HackerNews at once, every platform's answer is normalised into one
//! [`SearchResult`] shape, and the union is ordered chronologically or by
//! a weighted relevance score.
//!
//! ## Design
//!
//! - One tokio task per platform, all under a shared deadline and
//!   cancellation token
//! - HackerNews has no search API: its adapter scans the top-stories feed
//!   with a bounded number of concurrent item probes and filters by title
//! - A failing platform contributes an empty list; it never fails the request
//! - Per-platform circuit breaker so a dead upstream is skipped, not waited on
//! - In-memory TTL response cache keyed by a SHA-256 of the normalised request
//! - One credit per validated platform is held before any platform is
//!   called and committed on every satisfied request, including cache
//!   hits; an abandoned request hands its hold back
//!
//! ## Privacy
//!
//! - Search queries are logged only at trace level
//! - Credentials never appear in errors or logs

pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod meter;
pub mod normalize;
pub mod orchestrator;
pub mod platform;
pub mod platforms;
pub mod request;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SearchConfig;
pub use engine::SearchEngine;
pub use error::{Result, SearchError};
pub use meter::{
    EntitlementService, QuotaStatus, Reservation, UsageKind, UsageMeter, UsageService,
};
pub use orchestrator::RankingWeights;
pub use platform::{PlatformAdapter, PlatformQuery, PlatformRegistry};
pub use request::{SearchRequest, SearchRequestBody};
pub use types::{Platform, SearchResponse, SearchResult, SortMode};
