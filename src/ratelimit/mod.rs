//! Rate limiting logic and state management.

mod backend;
mod limiter;
mod state;

pub use backend::StateBackend;
pub use limiter::{RateLimitDecision, RateLimiter};
pub use state::{unix_now, RateLimitState};
