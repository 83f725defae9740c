//! Cross-platform merge and ordering.
//!
//! All platforms' results are concatenated (no cross-platform limit) and
//! ordered by one of two modes:
//!
//! - `chronological`: comment count descending, newest first on ties.
//! - `ranked`: weighted score, highest first.
//!
//! # Ranked scoring formula
//!
//! ```text
//! score = 0.5 * log10(comments + 1)
//!       + 0.3 * log10(max(1, engagement))
//!       + 0.2 * max(0, 100 - age_days)
//! ```
//!
//! Weights and the recency window come from [`RankingWeights`]. Discussion
//! volume is weighted above raw popularity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::{SearchResult, SortMode};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Weights for the `ranked` scoring formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    /// Weight of `log10(comments + 1)`.
    pub comment_weight: f64,
    /// Weight of `log10(max(1, engagement))`.
    pub engagement_weight: f64,
    /// Weight of the recency term.
    pub recency_weight: f64,
    /// Age in days after which the recency term is 0.
    pub recency_window_days: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            comment_weight: 0.5,
            engagement_weight: 0.3,
            recency_weight: 0.2,
            recency_window_days: 100.0,
        }
    }
}

impl RankingWeights {
    /// All weights must be finite and non-negative.
    pub fn validate(&self) -> Result<(), SearchError> {
        let values = [
            self.comment_weight,
            self.engagement_weight,
            self.recency_weight,
            self.recency_window_days,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(SearchError::Config(
                "ranking weights must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Score a result for `ranked` mode.
///
/// Items dated in the future count as age 0. The result is always finite:
/// a result with no comments, no engagement and an age beyond the window
/// scores exactly 0.
pub fn relevance_score(result: &SearchResult, now: DateTime<Utc>, weights: &RankingWeights) -> f64 {
    let comments = (result.comment_count as f64 + 1.0).log10();
    let engagement = (result.engagement_count.max(1) as f64).log10();

    let age_secs = now.signed_duration_since(result.published_at).num_seconds();
    let age_days = (age_secs as f64 / SECONDS_PER_DAY).max(0.0);
    let recency = (weights.recency_window_days - age_days).max(0.0);

    weights.comment_weight * comments
        + weights.engagement_weight * engagement
        + weights.recency_weight * recency
}

/// Concatenate every platform's results and order them by `mode`.
///
/// The output order depends only on the results themselves, never on the
/// order in which platforms finished.
pub fn merge(
    per_platform: Vec<Vec<SearchResult>>,
    mode: SortMode,
    now: DateTime<Utc>,
    weights: &RankingWeights,
) -> Vec<SearchResult> {
    let mut merged: Vec<SearchResult> = per_platform.into_iter().flatten().collect();
    match mode {
        SortMode::Chronological => sort_chronological(&mut merged),
        SortMode::Ranked => sort_ranked(&mut merged, now, weights),
    }
    merged
}

fn sort_chronological(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.comment_count
            .cmp(&a.comment_count)
            .then_with(|| b.published_at.cmp(&a.published_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn sort_ranked(results: &mut Vec<SearchResult>, now: DateTime<Utc>, weights: &RankingWeights) {
    let mut scored: Vec<(f64, SearchResult)> = results
        .drain(..)
        .map(|r| (relevance_score(&r, now, weights), r))
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .total_cmp(score_a)
            .then_with(|| b.published_at.cmp(&a.published_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    results.extend(scored.into_iter().map(|(_, r)| r));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
    }

    fn make_result(id: &str, comments: u64, engagement: u64, age_days: i64) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            title: format!("Title {id}"),
            snippet: None,
            source: "Reddit".into(),
            source_id: id.to_string(),
            url: format!("https://example.com/{id}"),
            published_at: now() - Duration::days(age_days),
            author: String::new(),
            engagement_count: engagement,
            comment_count: comments,
        }
    }

    fn ids(results: &[SearchResult]) -> Vec<&str> {
        results.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn score_matches_formula() {
        let result = make_result("a", 99, 1000, 10);
        let score = relevance_score(&result, now(), &RankingWeights::default());
        // 0.5 * log10(100) + 0.3 * log10(1000) + 0.2 * 90 = 1.0 + 0.9 + 18.0
        assert!((score - 19.9).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn inert_old_result_scores_zero_but_finite() {
        let result = make_result("old", 0, 0, 400);
        let score = relevance_score(&result, now(), &RankingWeights::default());
        assert!(score.is_finite());
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn future_dated_result_capped_at_full_recency() {
        let result = make_result("future", 0, 0, -5);
        let score = relevance_score(&result, now(), &RankingWeights::default());
        assert!((score - 20.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn custom_weights_applied() {
        let weights = RankingWeights {
            comment_weight: 1.0,
            engagement_weight: 0.0,
            recency_weight: 0.0,
            recency_window_days: 100.0,
        };
        let result = make_result("a", 9, 5000, 1);
        let score = relevance_score(&result, now(), &weights);
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn chronological_orders_by_comments_then_recency() {
        let merged = merge(
            vec![
                vec![make_result("few", 1, 900, 1), make_result("many-old", 50, 0, 30)],
                vec![make_result("many-new", 50, 0, 2), make_result("none", 0, 10_000, 0)],
            ],
            SortMode::Chronological,
            now(),
            &RankingWeights::default(),
        );
        assert_eq!(ids(&merged), vec!["many-new", "many-old", "few", "none"]);
    }

    #[test]
    fn ranked_orders_by_score() {
        let merged = merge(
            vec![
                vec![make_result("stale", 0, 0, 300)],
                vec![make_result("busy", 500, 20, 50), make_result("fresh", 0, 0, 0)],
            ],
            SortMode::Ranked,
            now(),
            &RankingWeights::default(),
        );
        // fresh: 20.0; busy: 0.5*2.7 + 0.3*1.3 + 10 = 11.74; stale: 0
        assert_eq!(ids(&merged), vec!["fresh", "busy", "stale"]);
    }

    #[test]
    fn ranked_newer_wins_with_identical_counts() {
        let merged = merge(
            vec![vec![make_result("older", 3, 3, 20), make_result("newer", 3, 3, 5)]],
            SortMode::Ranked,
            now(),
            &RankingWeights::default(),
        );
        assert_eq!(ids(&merged), vec!["newer", "older"]);

        // Beyond the recency window both score the same; newer still first.
        let merged = merge(
            vec![vec![make_result("older", 3, 3, 300), make_result("newer", 3, 3, 200)]],
            SortMode::Ranked,
            now(),
            &RankingWeights::default(),
        );
        assert_eq!(ids(&merged), vec!["newer", "older"]);
    }

    #[test]
    fn merge_keeps_every_result() {
        let per_platform: Vec<Vec<SearchResult>> = (0..3)
            .map(|p| {
                (0..10)
                    .map(|i| make_result(&format!("p{p}-{i}"), i, i, i as i64))
                    .collect()
            })
            .collect();
        let merged = merge(
            per_platform,
            SortMode::Ranked,
            now(),
            &RankingWeights::default(),
        );
        assert_eq!(merged.len(), 30);
    }

    #[test]
    fn merge_order_independent_of_platform_order() {
        let a = vec![make_result("a1", 4, 1, 3), make_result("a2", 0, 0, 0)];
        let b = vec![make_result("b1", 4, 1, 3), make_result("b2", 9, 0, 8)];
        for mode in [SortMode::Chronological, SortMode::Ranked] {
            let forward = merge(
                vec![a.clone(), b.clone()],
                mode,
                now(),
                &RankingWeights::default(),
            );
            let backward = merge(
                vec![b.clone(), a.clone()],
                mode,
                now(),
                &RankingWeights::default(),
            );
            assert_eq!(ids(&forward), ids(&backward));
        }
    }

    #[test]
    fn invalid_weights_rejected() {
        let weights = RankingWeights {
            comment_weight: f64::NAN,
            ..Default::default()
        };
        assert!(weights.validate().is_err());
        let weights = RankingWeights {
            recency_weight: -0.1,
            ..Default::default()
        };
        assert!(weights.validate().is_err());
        assert!(RankingWeights::default().validate().is_ok());
    }
}
