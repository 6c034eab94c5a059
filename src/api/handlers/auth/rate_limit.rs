//! Rate limiting primitives for verification flows.
//!
//! Verify and resend are throttled per user: by default 6 attempts per
//! 60-second window for each action. Limits are kept in process memory, so each
//! instance enforces its own window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;
pub const DEFAULT_WINDOW_SECONDS: u64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    VerifyEmail,
    ResendVerification,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_user(&self, user_id: i64, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_user(&self, _user_id: i64, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

#[derive(Debug)]
struct Window {
    started_at: Instant,
    attempts: u32,
}

#[derive(Debug)]
struct Windows {
    entries: HashMap<(i64, RateLimitAction), Window>,
    last_sweep: Instant,
}

/// Fixed-window limiter keyed by user and action.
///
/// Each check only touches its own key; stale windows of other users are
/// swept at most once per window length.
#[derive(Debug)]
pub struct WindowRateLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<Windows>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            window: if window.is_zero() {
                Duration::from_secs(1)
            } else {
                window
            },
            windows: Mutex::new(Windows {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    fn check_at(&self, user_id: i64, action: RateLimitAction, now: Instant) -> RateLimitDecision {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if now.saturating_duration_since(windows.last_sweep) >= self.window {
            let window = self.window;
            windows
                .entries
                .retain(|_, entry| now.saturating_duration_since(entry.started_at) < window);
            windows.last_sweep = now;
        }

        let entry = windows.entries.entry((user_id, action)).or_insert(Window {
            started_at: now,
            attempts: 0,
        });
        if now.saturating_duration_since(entry.started_at) >= self.window {
            entry.started_at = now;
            entry.attempts = 0;
        }
        if entry.attempts >= self.max_attempts {
            return RateLimitDecision::Limited;
        }
        entry.attempts += 1;
        RateLimitDecision::Allowed
    }
}

impl Default for WindowRateLimiter {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_secs(DEFAULT_WINDOW_SECONDS),
        )
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_user(&self, user_id: i64, action: RateLimitAction) -> RateLimitDecision {
        self.check_at(user_id, action, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_rate_limiter_allows() {
        let limiter = NoopRateLimiter;
        for _ in 0..100 {
            assert_eq!(
                limiter.check_user(1, RateLimitAction::VerifyEmail),
                RateLimitDecision::Allowed
            );
        }
    }

    #[test]
    fn window_limits_after_max_attempts() {
        let limiter = WindowRateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        let action = RateLimitAction::ResendVerification;
        assert_eq!(limiter.check_at(1, action, now), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at(1, action, now), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at(1, action, now), RateLimitDecision::Limited);

        // Other users and actions have their own windows.
        assert_eq!(limiter.check_at(2, action, now), RateLimitDecision::Allowed);
        assert_eq!(
            limiter.check_at(1, RateLimitAction::VerifyEmail, now),
            RateLimitDecision::Allowed
        );
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = WindowRateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let action = RateLimitAction::VerifyEmail;
        assert_eq!(limiter.check_at(1, action, start), RateLimitDecision::Allowed);
        assert_eq!(limiter.check_at(1, action, start), RateLimitDecision::Limited);

        let later = start + Duration::from_secs(61);
        assert_eq!(limiter.check_at(1, action, later), RateLimitDecision::Allowed);
    }

    #[test]
    fn stale_windows_are_swept_once_per_window() {
        let limiter = WindowRateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        for user_id in 0..100 {
            limiter.check_at(user_id, RateLimitAction::VerifyEmail, start);
        }
        let entries = |limiter: &WindowRateLimiter| {
            limiter
                .windows
                .lock()
                .map_or(0, |windows| windows.entries.len())
        };
        assert_eq!(entries(&limiter), 100);

        // Within the window only the caller's key is touched.
        let soon = start + Duration::from_secs(30);
        limiter.check_at(500, RateLimitAction::VerifyEmail, soon);
        assert_eq!(entries(&limiter), 101);

        let later = start + Duration::from_secs(61);
        assert_eq!(
            limiter.check_at(0, RateLimitAction::VerifyEmail, later),
            RateLimitDecision::Allowed
        );
        // User 500's window is still open; user 0 got a fresh one.
        assert_eq!(entries(&limiter), 2);
    }

    #[test]
    fn zero_config_is_clamped() {
        let limiter = WindowRateLimiter::new(0, Duration::ZERO);
        assert_eq!(limiter.max_attempts, 1);
        assert_eq!(limiter.window, Duration::from_secs(1));
    }
}
