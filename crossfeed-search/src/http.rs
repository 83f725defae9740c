//! Shared HTTP plumbing for platform adapters.
//!
//! Provides one configured [`reqwest::Client`] (timeout, User-Agent,
//! compression) and a JSON fetch helper that maps non-success statuses to
//! [`SearchError::Platform`].

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::Platform;

/// Build the [`reqwest::Client`] shared by all adapters.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.platform_timeout_secs))
        .user_agent(config.effective_user_agent())
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and decode a JSON body.
///
/// # Errors
///
/// - [`SearchError::Http`] on transport failure
/// - [`SearchError::Platform`] on a non-success status (429 is reported as
///   rate limiting, 401/403 as an auth failure)
/// - [`SearchError::Parse`] if the body is not the expected JSON
pub async fn fetch_json<T: DeserializeOwned>(
    platform: Platform,
    request: reqwest::RequestBuilder,
) -> Result<T, SearchError> {
    let response = request
        .send()
        .await
        .map_err(|e| SearchError::Http(format!("{platform} request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let message = match status.as_u16() {
            429 => "rate limited (HTTP 429)".to_string(),
            401 | 403 => format!("authentication failed (HTTP {})", status.as_u16()),
            code => format!("HTTP {code}"),
        };
        return Err(SearchError::Platform { platform, message });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| SearchError::Parse(format!("{platform} response: {e}")))
}

/// Resolve a configured base URL override, trimming any trailing slash.
pub fn base_url(configured: Option<&str>, default: &str) -> String {
    configured
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn build_client_with_default_config() {
        assert!(build_client(&SearchConfig::default()).is_ok());
    }

    #[test]
    fn base_url_override_trimmed() {
        assert_eq!(
            base_url(Some("http://127.0.0.1:9000/"), "https://example.com"),
            "http://127.0.0.1:9000"
        );
        assert_eq!(base_url(None, "https://example.com"), "https://example.com");
    }

    #[tokio::test]
    async fn fetch_json_decodes_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": 7})))
            .mount(&server)
            .await;

        let client = build_client(&SearchConfig::default()).expect("client");
        let payload: Payload = fetch_json(
            Platform::Reddit,
            client.get(format!("{}/ok", server.uri())),
        )
        .await
        .expect("decoded");
        assert_eq!(payload.value, 7);
    }

    #[tokio::test]
    async fn fetch_json_maps_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = build_client(&SearchConfig::default()).expect("client");
        let err = fetch_json::<Payload>(Platform::Twitter, client.get(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Platform { platform: Platform::Twitter, .. }));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn fetch_json_reports_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
            .mount(&server)
            .await;

        let client = build_client(&SearchConfig::default()).expect("client");
        let err = fetch_json::<Payload>(Platform::Reddit, client.get(server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Parse(_)));
    }
}
