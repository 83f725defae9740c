//! Request validation and normalisation.
//!
//! Raw caller input ([`SearchRequestBody`]) is turned into a
//! [`SearchRequest`] before any cache, entitlement or usage logic runs.
//! Everything downstream works from the validated platform set, never
//! from the caller's raw list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::types::{Platform, SortMode};

/// Search input exactly as the caller sent it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequestBody {
    /// Free-text query.
    pub query: String,
    /// Platform identifiers; unknown entries are dropped.
    pub platforms: Vec<String>,
    /// Only include items published at or after this instant.
    pub from_date: Option<DateTime<Utc>>,
    /// Only include items published at or before this instant.
    pub to_date: Option<DateTime<Utc>>,
    /// Per-platform result cap.
    pub max_results: Option<usize>,
    /// `"chronological"` (default) or `"ranked"`.
    pub sort_mode: Option<String>,
    /// Accepted and echoed back; results are not paged.
    pub page: Option<u32>,
}

/// A validated, normalised search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Trimmed query with inner whitespace collapsed.
    pub query: String,
    /// Known platforms, deduplicated, in the caller's first-mention order.
    pub platforms: Vec<Platform>,
    /// Lower publication bound.
    pub from_date: Option<DateTime<Utc>>,
    /// Upper publication bound.
    pub to_date: Option<DateTime<Utc>>,
    /// Per-platform result cap, within `1..=max_results_cap`.
    pub max_results: usize,
    /// Merge ordering.
    pub sort_mode: SortMode,
    /// Requested page, at least 1.
    pub page: u32,
}

impl SearchRequest {
    /// Validate and normalise raw input.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] if the query is blank, no known
    /// platform remains after filtering, or `fromDate` is after `toDate`.
    pub fn from_body(body: SearchRequestBody, config: &SearchConfig) -> Result<Self> {
        let query = normalise_query(&body.query);
        if query.is_empty() {
            return Err(SearchError::Validation("query must not be empty".into()));
        }

        let platforms = normalise_platforms(&body.platforms);
        if platforms.is_empty() {
            return Err(SearchError::Validation(
                "at least one supported platform is required".into(),
            ));
        }

        if let (Some(from), Some(to)) = (body.from_date, body.to_date) {
            if from > to {
                return Err(SearchError::Validation(
                    "fromDate must not be after toDate".into(),
                ));
            }
        }

        let max_results = body
            .max_results
            .unwrap_or(config.default_max_results)
            .clamp(1, config.max_results_cap);

        let sort_mode = body
            .sort_mode
            .as_deref()
            .and_then(SortMode::from_id)
            .unwrap_or_default();

        Ok(Self {
            query,
            platforms,
            from_date: body.from_date,
            to_date: body.to_date,
            max_results,
            sort_mode,
            page: body.page.unwrap_or(1).max(1),
        })
    }

    /// Platform count, which is also the usage cost of this request.
    pub fn cost(&self) -> u64 {
        self.platforms.len() as u64
    }

    /// The platform set in canonical order.
    pub fn canonical_platforms(&self) -> Vec<Platform> {
        let mut sorted = self.platforms.clone();
        sorted.sort();
        sorted
    }
}

/// Trim and collapse runs of whitespace to single spaces.
fn normalise_query(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Filter to the allow-list and drop duplicates, keeping first-mention order.
fn normalise_platforms(raw: &[String]) -> Vec<Platform> {
    let mut platforms = Vec::with_capacity(raw.len());
    for id in raw {
        match Platform::from_id(id) {
            Some(platform) if !platforms.contains(&platform) => platforms.push(platform),
            Some(_) => {}
            None => tracing::debug!(platform = %id, "dropping unknown platform"),
        }
    }
    platforms
}
