//! Process-local state backend.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::ratelimit::{RateLimitState, StateBackend};

/// State backend holding every record in a concurrent in-process map.
///
/// Nothing is persisted across restarts. Individual reads and writes are
/// atomic per entry; read-modify-write sequences are serialized by the
/// limiter, not here.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: DashMap<String, RateLimitState>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a stored record.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether no key has a stored record.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl StateBackend for InMemoryStateStore {
    async fn get_state(&self, api_key: &str) -> Result<Option<RateLimitState>, StoreError> {
        Ok(self.states.get(api_key).map(|entry| *entry.value()))
    }

    async fn save_state(&self, api_key: &str, state: &RateLimitState) -> Result<(), StoreError> {
        self.states.insert(api_key.to_string(), *state);
        Ok(())
    }

    async fn clear_state(&self, api_key: &str) -> Result<(), StoreError> {
        self.states.remove(api_key);
        Ok(())
    }
}
