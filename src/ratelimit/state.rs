//! Per-key rate limit state and the fixed-window expiry policy.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Current wall-clock time as seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Request count accumulated in the current window for one API key.
///
/// Serialized as `{"count": <u64>, "window_start": <f64>}`; the file backend
/// stores exactly this shape per key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitState {
    /// Requests counted in this window, including rejected ones
    pub count: u64,
    /// When the current window started (seconds since the Unix epoch)
    pub window_start: f64,
}

impl RateLimitState {
    /// Create a fresh state whose window starts at `now`.
    pub fn new(now: f64) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Whether the window has run its full length as of `now`.
    ///
    /// The boundary itself counts as expired.
    pub fn is_window_expired(&self, now: f64, window_seconds: u64) -> bool {
        (now - self.window_start) >= window_seconds as f64
    }

    /// Start a new window at `now` with a zero count.
    pub fn reset(&mut self, now: f64) {
        self.count = 0;
        self.window_start = now;
    }

    /// Requests still available under `limit` in this window.
    pub fn remaining(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.count)
    }

    /// Time left until the window expires, zero once it has.
    ///
    /// Saturates at `Duration::MAX` for windows longer than a `Duration` can hold.
    pub fn duration_until_reset(&self, now: f64, window_seconds: u64) -> Duration {
        let left = self.window_start + window_seconds as f64 - now;
        if left <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(left).unwrap_or(Duration::MAX)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_empty() {
        let state = RateLimitState::new(100.0);
        assert_eq!(state.count, 0);
        assert_eq!(state.window_start, 100.0);
    }

    #[test]
    fn test_window_not_expired_inside_window() {
        let state = RateLimitState::new(100.0);
        assert!(!state.is_window_expired(100.0, 60));
        assert!(!state.is_window_expired(159.9, 60));
    }

    #[test]
    fn test_window_expired_at_exact_boundary() {
        let state = RateLimitState::new(100.0);
        assert!(state.is_window_expired(160.0, 60));
        assert!(state.is_window_expired(1000.0, 60));
    }

    #[test]
    fn test_clock_behind_window_start_is_not_expired() {
        let state = RateLimitState::new(100.0);
        assert!(!state.is_window_expired(50.0, 1));
    }

    #[test]
    fn test_reset_clears_count_and_moves_window() {
        let mut state = RateLimitState {
            count: 7,
            window_start: 10.0,
        };
        state.reset(75.5);
        assert_eq!(state, RateLimitState::new(75.5));
    }

    #[test]
    fn test_remaining_saturates() {
        let mut state = RateLimitState::new(0.0);
        state.count = 3;
        assert_eq!(state.remaining(5), 2);
        state.count = 9;
        assert_eq!(state.remaining(5), 0);
    }

    #[test]
    fn test_duration_until_reset() {
        let state = RateLimitState::new(100.0);
        assert_eq!(state.duration_until_reset(130.0, 60), Duration::from_secs(30));
        assert_eq!(state.duration_until_reset(160.0, 60), Duration::ZERO);
        assert_eq!(state.duration_until_reset(500.0, 60), Duration::ZERO);
    }

    #[test]
    fn test_duration_until_reset_saturates_for_huge_windows() {
        let state = RateLimitState::new(100.0);
        assert_eq!(state.duration_until_reset(100.0, u64::MAX), Duration::MAX);
    }

    #[test]
    fn test_serialized_field_names() {
        let state = RateLimitState {
            count: 2,
            window_start: 1.5,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json, serde_json::json!({"count": 2, "window_start": 1.5}));
    }

    #[test]
    fn test_unix_now_is_after_2020() {
        assert!(unix_now() > 1_577_836_800.0);
    }
}
