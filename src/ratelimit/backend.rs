//! Storage trait for abstracting in-memory and file-backed state.

use async_trait::async_trait;

use super::state::RateLimitState;
use crate::error::StoreError;

/// Trait for rate limit state backends.
///
/// The backend exclusively owns every [`RateLimitState`]; the limiter reads
/// and writes through it on each check and never caches records.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Fetch the state for `api_key`, or `None` if the key has never been seen.
    async fn get_state(&self, api_key: &str) -> Result<Option<RateLimitState>, StoreError>;

    /// Store `state` for `api_key`, replacing any previous record.
    async fn save_state(&self, api_key: &str, state: &RateLimitState) -> Result<(), StoreError>;

    /// Remove the state for `api_key`. Unknown keys are a no-op.
    async fn clear_state(&self, api_key: &str) -> Result<(), StoreError>;
}
