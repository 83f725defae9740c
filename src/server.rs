//! HTTP front end for the aggregation engine.
//!
//! ## Endpoints
//!
//! - `POST /search` with a JSON body, or `GET /search` with query
//!   parameters (`platforms` comma-separated)
//! - `GET /health`
//! - `POST /admin/cache/sweep`
//!
//! The caller is identified by the `x-user-id` header; without it the
//! request runs as `anonymous` on the default tier.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use axum::routing::{get, post};
use chrono::{DateTime, Utc};
use crossfeed_search::{SearchEngine, SearchError, SearchRequestBody, SearchResponse};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info};
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::config::ServerConfig;
use crate::error::{ApiError, ServiceError};

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// User id applied when the header is missing or blank.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone)]
struct AppState {
    engine: Arc<SearchEngine>,
    accounts: Arc<AccountStore>,
}

impl AppState {
    fn api_error(&self, error: SearchError) -> ApiError {
        let tier = match &error {
            SearchError::Entitlement { platform } => self.accounts.required_tier_for(*platform),
            _ => None,
        };
        ApiError::from(error).with_required_tier(tier)
    }
}

/// `GET /search` query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SearchParams {
    query: String,
    platforms: String,
    from_date: Option<DateTime<Utc>>,
    to_date: Option<DateTime<Utc>>,
    max_results: Option<usize>,
    sort_mode: Option<String>,
    page: Option<u32>,
}

impl From<SearchParams> for SearchRequestBody {
    fn from(params: SearchParams) -> Self {
        Self {
            query: params.query,
            platforms: params
                .platforms
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect(),
            from_date: params.from_date,
            to_date: params.to_date,
            max_results: params.max_results,
            sort_mode: params.sort_mode,
            page: params.page,
        }
    }
}

/// `GET /health` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"ok"` while the server answers.
    pub status: String,
    /// Approximate number of cached responses.
    pub cache_entries: u64,
    /// Platforms with a registered adapter.
    pub platforms: Vec<String>,
}

/// `POST /admin/cache/sweep` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResponse {
    /// Expired entries removed by this sweep.
    pub removed: usize,
}

/// A running crossfeed HTTP server.
///
/// Dropping it stops the listener and the cache sweeper.
pub struct CrossfeedServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    sweeper: Option<JoinHandle<()>>,
}

impl CrossfeedServer {
    /// Start serving.
    ///
    /// Binds to `{config.host}:{config.port}` (use port `0` for
    /// auto-assign) and serves in a background tokio task. When
    /// `cache_sweep_interval_secs` is non-zero a second task sweeps expired
    /// cache entries on that interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(
        engine: Arc<SearchEngine>,
        accounts: Arc<AccountStore>,
        config: &ServerConfig,
    ) -> crate::error::Result<Self> {
        let app = router(Arc::clone(&engine), accounts);

        let bind_addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| ServiceError::Server(format!("bind {bind_addr} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServiceError::Server(format!("failed to get local addr: {e}")))?;

        info!("crossfeed listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("crossfeed server error: {e}");
            }
        });

        let sweeper = (config.cache_sweep_interval_secs > 0).then(|| {
            spawn_sweeper(engine, Duration::from_secs(config.cache_sweep_interval_secs))
        });

        Ok(Self {
            addr,
            handle,
            sweeper,
        })
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Abort the server and sweeper tasks.
    pub fn shutdown(&self) {
        self.handle.abort();
        if let Some(sweeper) = &self.sweeper {
            sweeper.abort();
        }
    }
}

impl Drop for CrossfeedServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn router(engine: Arc<SearchEngine>, accounts: Arc<AccountStore>) -> Router {
    Router::new()
        .route("/search", get(handle_search_get).post(handle_search_post))
        .route("/health", get(handle_health))
        .route("/admin/cache/sweep", post(handle_sweep))
        .with_state(AppState { engine, accounts })
}

fn spawn_sweeper(engine: Arc<SearchEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = engine.sweep_cache().await;
            if removed > 0 {
                info!(removed, "cache sweep");
            }
        }
    })
}

async fn handle_search_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SearchRequestBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) = body.map_err(|e| SearchError::Validation(e.body_text()))?;
    run_search(&state, &headers, body).await
}

async fn handle_search_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params.map_err(|e| SearchError::Validation(e.body_text()))?;
    run_search(&state, &headers, params.into()).await
}

async fn run_search(
    state: &AppState,
    headers: &HeaderMap,
    body: SearchRequestBody,
) -> Result<Json<SearchResponse>, ApiError> {
    let user_id = user_id(headers);
    let span = tracing::info_span!("search", request_id = %Uuid::new_v4(), user_id = %user_id);

    // Axum drops this future when the client goes away; the guard then
    // cancels every platform call still in flight.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    state
        .engine
        .search(&user_id, body, &cancel)
        .instrument(span)
        .await
        .map(Json)
        .map_err(|e| state.api_error(e))
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        cache_entries: state.engine.cache_len(),
        platforms: state
            .engine
            .available_platforms()
            .iter()
            .map(|p| p.id().to_owned())
            .collect(),
    })
}

async fn handle_sweep(State(state): State<AppState>) -> Json<SweepResponse> {
    let removed = state.engine.sweep_cache().await;
    info!(removed, "cache sweep (admin)");
    Json(SweepResponse { removed })
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS_USER)
        .to_owned()
}
