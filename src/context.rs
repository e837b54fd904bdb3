//! Application context shared by request handlers.

use std::sync::Arc;

use tracing::info;

use crate::config::{BackendKind, Settings};
use crate::error::{QuotagateError, Result};
use crate::ratelimit::{RateLimiter, StateBackend};
use crate::store::{FileStateStore, InMemoryStateStore};

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppContext {
    settings: Arc<Settings>,
    backend: Arc<dyn StateBackend>,
    limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Validate `settings`, open the configured backend and build the limiter.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;

        let backend: Arc<dyn StateBackend> = match settings.state.backend {
            BackendKind::Memory => {
                info!("Using in-memory state backend");
                Arc::new(InMemoryStateStore::new())
            }
            BackendKind::File => {
                let path = settings.state.file_path.clone().ok_or_else(|| {
                    QuotagateError::Config(
                        "file_path must be set when state backend is 'file'".to_string(),
                    )
                })?;
                info!(path = %path.display(), "Using file state backend");
                Arc::new(FileStateStore::new(path))
            }
        };

        Ok(Self::new(settings, backend))
    }

    /// Assemble a context around an existing backend.
    pub fn new(settings: Settings, backend: Arc<dyn StateBackend>) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            settings.rate_limit.clone(),
            Arc::clone(&backend),
        ));

        Self {
            settings: Arc::new(settings),
            backend,
            limiter,
        }
    }

    /// Settings the service was started with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Backend holding every key's state, shared with the limiter.
    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }

    /// The decision engine guarding the protected resource.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
