//! Error types for the crossfeed service.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use crossfeed_search::SearchError;
use serde::Serialize;

/// Top-level error type for service startup and configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Search engine construction error.
    #[error("search engine error: {0}")]
    Search(#[from] SearchError),

    /// HTTP server error.
    #[error("server error: {0}")]
    Server(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// A [`SearchError`] on its way out of an HTTP handler.
///
/// Carries the tier a gated platform needs, when known, so the 403 body
/// can name it.
#[derive(Debug)]
pub struct ApiError {
    error: SearchError,
    required_tier: Option<String>,
}

impl ApiError {
    /// Attach the tier that would satisfy an entitlement failure.
    pub fn with_required_tier(mut self, tier: Option<String>) -> Self {
        self.required_tier = tier;
        self
    }

    /// The underlying engine error.
    pub fn error(&self) -> &SearchError {
        &self.error
    }

    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match self.error {
            SearchError::Validation(_) => StatusCode::BAD_REQUEST,
            SearchError::Entitlement { .. } => StatusCode::FORBIDDEN,
            SearchError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        Self {
            error,
            required_tier: None,
        }
    }
}

/// JSON body of every non-200 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error_code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_usage: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upgrade_hint: Option<String>,
}

impl ErrorBody {
    fn new(error_code: &'static str, message: String) -> Self {
        Self {
            error_code,
            message,
            current_usage: None,
            limit: None,
            reset_at: None,
            required_tier: None,
            upgrade_hint: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.error.error_code();

        let body = match self.error {
            SearchError::Validation(message) => ErrorBody::new(code, message),
            SearchError::Entitlement { platform } => {
                let hint = match &self.required_tier {
                    Some(tier) => format!("Upgrade to the {tier} tier to search {}.", platform.label()),
                    None => format!("{} is not available on your plan.", platform.label()),
                };
                ErrorBody {
                    required_tier: self.required_tier,
                    upgrade_hint: Some(hint),
                    ..ErrorBody::new(
                        code,
                        format!("{} requires a higher account tier", platform.label()),
                    )
                }
            }
            SearchError::QuotaExceeded {
                used,
                limit,
                requested,
                reset_at,
            } => ErrorBody {
                current_usage: Some(used),
                limit: Some(limit),
                reset_at: Some(reset_at),
                upgrade_hint: Some(
                    "Upgrade your plan for more monthly credits, or retry after resetAt.".into(),
                ),
                ..ErrorBody::new(
                    code,
                    format!("this search needs {requested} credits; {used} of {limit} used"),
                )
            },
            other => {
                tracing::error!(error = %other, "request failed");
                ErrorBody::new(code, "internal error".into())
            }
        };

        (status, Json(body)).into_response()
    }
}
