//! Error types for the Quotagate service.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for service-level operations (startup, configuration, serving).
#[derive(Error, Debug)]
pub enum QuotagateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for service-level operations.
pub type Result<T> = std::result::Result<T, QuotagateError>;

/// Infrastructure failures raised by a state backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the state document failed.
    #[error("failed to access state file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The state document exists but is not valid JSON.
    #[error("state file {} contains malformed JSON: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Encoding the state document failed.
    #[error("failed to serialize rate limit state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Outcome of a rejected rate limit check.
///
/// The first three variants are policy decisions; `Storage` is an
/// infrastructure failure and is never folded into one of them.
#[derive(Error, Debug)]
pub enum RateLimitError {
    /// No API key was supplied.
    #[error("missing API key")]
    MissingKey,

    /// The API key is not in the allow-list.
    #[error("invalid API key")]
    InvalidKey,

    /// The quota for the current window is exhausted.
    #[error("rate limit exceeded: {count} requests against a limit of {limit}")]
    LimitExceeded {
        count: u64,
        limit: u64,
        retry_after: Duration,
    },

    /// The backend could not load or persist state.
    #[error(transparent)]
    Storage(#[from] StoreError),
}
