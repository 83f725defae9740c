//! crossfeed: one query, every platform.
//!
//! HTTP service around the [`crossfeed_search`] engine. A single search
//! is fanned out to YouTube, Reddit, Twitter, BlueSky and HackerNews, and
//! the merged, normalised results come back as one JSON response.
//!
//! # Architecture
//!
//! - **Config**: TOML file plus environment credentials ([`config`])
//! - **Accounts**: tiers, gated platforms and monthly usage ([`accounts`])
//! - **Engine**: validation, cache, fan-out and ranking ([`crossfeed_search`])
//! - **Server**: axum routes and error mapping ([`server`], [`error`])

pub mod accounts;
pub mod config;
pub mod error;
pub mod server;

pub use accounts::AccountStore;
pub use config::ServiceConfig;
pub use error::{ApiError, Result, ServiceError};
pub use server::CrossfeedServer;
