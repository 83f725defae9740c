//! Error types for the crossfeed-search crate.
//!
//! All errors use stable string messages suitable for display to callers
//! and programmatic handling. No credentials or query text appear in
//! error messages.

use chrono::{DateTime, Utc};

use crate::types::Platform;

/// Errors that can occur while serving an aggregated search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The request was rejected before any platform was queried.
    #[error("validation error: {0}")]
    Validation(String),

    /// The caller's tier does not include a requested gated platform.
    #[error("platform {platform} requires a tier upgrade")]
    Entitlement {
        /// The gated platform that was requested.
        platform: Platform,
    },

    /// The caller does not have enough usage credits for this request.
    #[error("usage quota exceeded: {used}/{limit} credits used, {requested} requested")]
    QuotaExceeded {
        /// Credits already consumed in the current window.
        used: u64,
        /// Credit limit for the current window.
        limit: u64,
        /// Credits this request would consume.
        requested: u64,
        /// When the current usage window resets.
        reset_at: DateTime<Utc>,
    },

    /// A single platform's upstream call failed (non-success status,
    /// rate limiting, auth failure).
    #[error("{platform} error: {message}")]
    Platform {
        /// The platform whose call failed.
        platform: Platform,
        /// What went wrong.
        message: String,
    },

    /// An HTTP request to a platform failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse a platform response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// The shared cancellation signal fired before the call finished.
    #[error("search cancelled")]
    Cancelled,

    /// Invalid engine configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Anything else; the request cannot be served correctly.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SearchError {
    /// Stable machine-readable code for this error, used in API bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::Entitlement { .. } => "TIER_UPGRADE_REQUIRED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::Platform { .. }
            | Self::Http(_)
            | Self::Parse(_)
            | Self::Cancelled
            | Self::Config(_)
            | Self::Unexpected(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error was raised by one platform's unit of work and
    /// must be recovered locally by the orchestrator.
    pub fn is_platform_local(&self) -> bool {
        matches!(
            self,
            Self::Platform { .. } | Self::Http(_) | Self::Parse(_) | Self::Cancelled
        )
    }
}

/// Convenience type alias for crossfeed-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
