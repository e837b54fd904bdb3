//! Response bodies and the mapping from limiter errors to HTTP statuses.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::RateLimitError;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Body returned by the protected resource.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub message: String,
    pub timestamp: f64,
}

/// Read-only view of a key's rate limit state.
///
/// `window_start` is `null` and `count` is zero for a key with no record.
#[derive(Debug, Serialize, Deserialize)]
pub struct DebugStateResponse {
    pub count: u64,
    pub limit: u64,
    pub window_seconds: u64,
    pub window_start: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Whole seconds in `duration`, rounded up.
pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs_f64().ceil() as u64
}

impl RateLimitError {
    /// HTTP status for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RateLimitError::MissingKey => StatusCode::UNAUTHORIZED,
            RateLimitError::InvalidKey => StatusCode::FORBIDDEN,
            RateLimitError::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            RateLimitError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            RateLimitError::MissingKey => "Missing API key",
            RateLimitError::InvalidKey => "Invalid API key",
            RateLimitError::LimitExceeded { .. } => "Rate limit exceeded",
            RateLimitError::Storage(_) => "Internal server error",
        }
    }
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        if let RateLimitError::Storage(ref e) = self {
            error!(error = %e, "Rate limit state backend failed");
        }

        let body = Json(ErrorResponse {
            detail: self.detail().to_string(),
        });
        let mut response = (self.status_code(), body).into_response();

        if let RateLimitError::LimitExceeded { retry_after, .. } = self {
            let secs = ceil_secs(retry_after).max(1);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
