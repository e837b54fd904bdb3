//! Routes, handlers and the rate limit middleware.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;

use super::response::{ceil_secs, DebugStateResponse, HealthResponse, ResourceResponse};
use crate::context::AppContext;
use crate::error::RateLimitError;
use crate::ratelimit::unix_now;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Build the service router.
///
/// Only `/resource` sits behind the limiter; `/health` and the debug view
/// never count requests.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/resource", get(protected_resource))
        .route_layer(middleware::from_fn_with_state(
            ctx.clone(),
            enforce_rate_limit,
        ))
        .route("/health", get(health))
        .route("/debug/rate-limit", get(debug_rate_limit))
        .with_state(ctx)
}

/// Extract the API key header. Values that are not visible ASCII are kept
/// lossily so they fail the allow-list rather than look absent.
fn api_key(headers: &HeaderMap) -> Option<String> {
    headers.get(API_KEY_HEADER).map(|value| match value.to_str() {
        Ok(key) => key.to_string(),
        Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
    })
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
async fn enforce_rate_limit(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let key = api_key(request.headers());
    let decision = ctx.limiter().check(key.as_deref()).await?;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(LIMIT_HEADER, HeaderValue::from(decision.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(decision.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(ceil_secs(decision.reset_after)));
    Ok(response)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn protected_resource() -> impl IntoResponse {
    Json(ResourceResponse {
        message: "You have accessed a rate-limited resource".to_string(),
        timestamp: unix_now(),
    })
}

async fn debug_rate_limit(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<Json<DebugStateResponse>, RateLimitError> {
    let key = api_key(&headers)
        .filter(|k| !k.is_empty())
        .ok_or(RateLimitError::MissingKey)?;

    let config = ctx.limiter().config();
    let state = ctx.limiter().inspect(&key).await?;

    Ok(Json(DebugStateResponse {
        count: state.map_or(0, |s| s.count),
        limit: config.requests_per_window,
        window_seconds: config.window_seconds,
        window_start: state.map(|s| s.window_start),
    }))
}
