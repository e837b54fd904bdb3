//! Core rate limiter implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::StateBackend;
use super::state::{unix_now, RateLimitState};
use crate::config::RateLimitConfig;
use crate::error::{RateLimitError, StoreError};

/// Details of an admitted request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    /// Requests counted in the current window, this one included
    pub count: u64,
    /// Configured quota per window
    pub limit: u64,
    /// Requests still available in this window
    pub remaining: u64,
    /// Time until the current window resets
    pub reset_after: Duration,
}

/// The fixed-window decision engine.
///
/// Every check round-trips through the backend. The fetch, reset, increment
/// and persist steps for one key run under that key's lock, so concurrent
/// checks for the same key never lose an update. Locks are created up front
/// for each allowed key; unknown keys are rejected before any lock is taken.
pub struct RateLimiter {
    config: RateLimitConfig,
    backend: Arc<dyn StateBackend>,
    key_locks: HashMap<String, Mutex<()>>,
}

impl RateLimiter {
    /// Create a limiter over an already validated configuration.
    pub fn new(config: RateLimitConfig, backend: Arc<dyn StateBackend>) -> Self {
        let key_locks = config
            .allowed_api_keys
            .iter()
            .map(|key| (key.clone(), Mutex::new(())))
            .collect();

        Self {
            config,
            backend,
            key_locks,
        }
    }

    /// The configuration this limiter enforces.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and count a request for `api_key` at the current time.
    pub async fn check(&self, api_key: Option<&str>) -> Result<RateLimitDecision, RateLimitError> {
        self.check_at(api_key, unix_now()).await
    }

    /// Check and count a request for `api_key` as of `now` (Unix seconds).
    ///
    /// Over-limit attempts are persisted before `LimitExceeded` is returned,
    /// so the stored count keeps growing until the window resets.
    pub async fn check_at(
        &self,
        api_key: Option<&str>,
        now: f64,
    ) -> Result<RateLimitDecision, RateLimitError> {
        let api_key = match api_key {
            Some(key) if !key.is_empty() => key,
            _ => {
                warn!("Missing API key");
                return Err(RateLimitError::MissingKey);
            }
        };

        let Some(lock) = self.key_locks.get(api_key) else {
            warn!(api_key = %api_key, "Invalid API key attempted");
            return Err(RateLimitError::InvalidKey);
        };
        let _guard = lock.lock().await;

        let mut state = match self.backend.get_state(api_key).await? {
            Some(state) => state,
            None => {
                info!(api_key = %api_key, "Initializing rate limit state");
                RateLimitState::new(now)
            }
        };

        let window_seconds = self.config.window_seconds;
        if state.is_window_expired(now, window_seconds) {
            info!(api_key = %api_key, "Rate limit window expired, resetting state");
            state.reset(now);
        }

        state.count = state.count.saturating_add(1);
        let limit = self.config.requests_per_window;

        debug!(api_key = %api_key, count = state.count, limit, "Rate limit check");

        self.backend.save_state(api_key, &state).await?;

        let reset_after = state.duration_until_reset(now, window_seconds);
        if state.count > limit {
            warn!(
                api_key = %api_key,
                count = state.count,
                limit,
                "Rate limit exceeded"
            );
            return Err(RateLimitError::LimitExceeded {
                count: state.count,
                limit,
                retry_after: reset_after,
            });
        }

        Ok(RateLimitDecision {
            count: state.count,
            limit,
            remaining: state.remaining(limit),
            reset_after,
        })
    }

    /// Read the stored state for `api_key` without counting a request.
    pub async fn inspect(&self, api_key: &str) -> Result<Option<RateLimitState>, StoreError> {
        self.backend.get_state(api_key).await
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
