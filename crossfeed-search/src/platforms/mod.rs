//! Platform adapter implementations.
//!
//! Each module provides a struct implementing
//! [`crate::platform::PlatformAdapter`] against one platform's public API.

pub mod bluesky;
pub mod hackernews;
pub mod reddit;
pub mod twitter;
pub mod youtube;

use std::sync::Arc;

pub use bluesky::BlueSkyAdapter;
pub use hackernews::HackerNewsAdapter;
pub use reddit::RedditAdapter;
pub use twitter::TwitterAdapter;
pub use youtube::YouTubeAdapter;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::platform::PlatformRegistry;

/// Build the registry of real adapters from `config`.
///
/// All adapters share one HTTP client. YouTube and Twitter are only
/// registered when their credentials are configured; requests for them
/// otherwise resolve to an empty list.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the HTTP client cannot be built.
pub fn default_registry(config: &SearchConfig) -> Result<PlatformRegistry, SearchError> {
    let client = http::build_client(config)?;
    let settings = &config.platforms;

    let mut registry = PlatformRegistry::new()
        .with(Arc::new(RedditAdapter::new(
            client.clone(),
            http::base_url(settings.reddit.base_url.as_deref(), reddit::DEFAULT_BASE_URL),
        )))
        .with(Arc::new(BlueSkyAdapter::new(
            client.clone(),
            http::base_url(settings.bluesky.base_url.as_deref(), bluesky::DEFAULT_BASE_URL),
        )))
        .with(Arc::new(HackerNewsAdapter::new(
            client.clone(),
            http::base_url(
                settings.hackernews.base_url.as_deref(),
                hackernews::DEFAULT_BASE_URL,
            ),
            config.hackernews_scan_multiplier,
            config.hackernews_scan_concurrency,
        )));

    match non_blank(settings.youtube.api_key.as_deref()) {
        Some(key) => registry.register(Arc::new(YouTubeAdapter::new(
            client.clone(),
            http::base_url(settings.youtube.base_url.as_deref(), youtube::DEFAULT_BASE_URL),
            key.to_string(),
        ))),
        None => tracing::info!("no YouTube API key configured, YouTube disabled"),
    }

    match non_blank(settings.twitter.bearer_token.as_deref()) {
        Some(token) => registry.register(Arc::new(TwitterAdapter::new(
            client,
            http::base_url(settings.twitter.base_url.as_deref(), twitter::DEFAULT_BASE_URL),
            token.to_string(),
        ))),
        None => tracing::info!("no Twitter bearer token configured, Twitter disabled"),
    }

    tracing::debug!(platforms = ?registry.platforms(), "platform registry built");
    Ok(registry)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;

    #[test]
    fn credential_free_platforms_always_registered() {
        let registry = default_registry(&SearchConfig::default()).expect("registry");
        assert_eq!(
            registry.platforms(),
            vec![Platform::Reddit, Platform::BlueSky, Platform::HackerNews]
        );
    }

    #[test]
    fn credentialed_platforms_registered_when_configured() {
        let mut config = SearchConfig::default();
        config.platforms.youtube.api_key = Some("yt-key".into());
        config.platforms.twitter.bearer_token = Some("tw-token".into());
        let registry = default_registry(&config).expect("registry");
        assert_eq!(registry.platforms().len(), 5);
        assert!(registry.get(Platform::Twitter).is_some());
    }

    #[test]
    fn blank_credentials_ignored() {
        let mut config = SearchConfig::default();
        config.platforms.youtube.api_key = Some("   ".into());
        let registry = default_registry(&config).expect("registry");
        assert!(registry.get(Platform::YouTube).is_none());
    }
}
