use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower_http::timeout::TimeoutLayer;
use tracing::Instrument;
use uuid::Uuid;

use crate::{
    resolver::{CacheAside, CacheStatsSnapshot, FetchOutcome},
    utils::{retry_delay, ErrorResponse},
    weather::OriginError,
};

/// How many times, and how patiently, the handler re-resolves after a
/// transient origin failure.
///
/// `deadline` bounds the whole lookup including backoff. When it runs out the
/// handler answers with the last origin error instead of retrying.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub deadline: Duration,
}

// Headroom between the handler deadline and the router timeout layer, so a
// lookup that runs out of time still gets to write its error body.
const TIMEOUT_LAYER_GRACE: Duration = Duration::from_secs(1);

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<CacheAside>,
    pub retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub cache: CacheStatsSnapshot,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store_up = state.resolver.store_healthy().await;

    Json(HealthResponse {
        status: if store_up { "healthy" } else { "degraded" }.to_string(),
        store: if store_up { "up" } else { "down" }.to_string(),
        cache: state.resolver.stats(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_weather(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("weather", request_id = %request_id, location = %location);

    async move {
        match resolve_with_retry(&state, &location).await {
            Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(e) => {
                let status = status_for(&e);
                tracing::error!(status = status.as_u16(), "Weather lookup failed: {}", e);
                let error = ErrorResponse::new(&public_message(&e), e.code())
                    .with_request_id(request_id);
                (status, Json(error)).into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn resolve_with_retry(state: &AppState, location: &str) -> Result<String, OriginError> {
    let policy = state.retry;
    let deadline = Instant::now() + policy.deadline;
    let mut attempt = 0;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        // Dropping the resolve future on expiry cancels the in-flight call.
        let outcome = match tokio::time::timeout(remaining, state.resolver.resolve(location)).await {
            Ok(outcome) => outcome,
            Err(_) => FetchOutcome::Failed(OriginError::Timeout(policy.deadline)),
        };
        tracing::debug!(source = outcome.source(), attempt, "Resolved weather lookup");

        match outcome.into_result() {
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = retry_delay(policy.base_delay, attempt);
                if Instant::now() + delay >= deadline {
                    tracing::warn!(attempt, "Origin failed ({}), no time left to retry", e);
                    return Err(e);
                }
                tracing::warn!(
                    "Origin failed ({}), retrying in {}ms (attempt {})",
                    e,
                    delay.as_millis(),
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn status_for(error: &OriginError) -> StatusCode {
    match error {
        // Every failed lookup is a server-side error, whatever the cause.
        OriginError::InvalidKey => StatusCode::INTERNAL_SERVER_ERROR,
        OriginError::Transport(_)
        | OriginError::Timeout(_)
        | OriginError::UpstreamStatus { .. }
        | OriginError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

/// Client-facing text. Never includes the underlying error chain, which may
/// name internal hosts.
fn public_message(error: &OriginError) -> String {
    match error {
        OriginError::InvalidKey => "Location must not be empty".to_string(),
        OriginError::Transport(_) => "Weather provider is unreachable".to_string(),
        OriginError::Timeout(_) => "Weather provider did not answer in time".to_string(),
        OriginError::UpstreamStatus { code } => {
            format!("Weather provider returned HTTP {}", code)
        }
        OriginError::Decode(_) => "Weather provider returned an unexpected response".to_string(),
    }
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    let backstop = state.retry.deadline + TIMEOUT_LAYER_GRACE;

    Router::new()
        .route("/health", get(health))
        .route("/weather/:location", get(get_weather))
        .layer(TimeoutLayer::new(backstop))
        .with_state(state)
}
