//! Rate limiting primitives for auth flows.
//!
//! Fixed-window counting: the counter resets at the window boundary and the
//! bound holds per key regardless of credential correctness, so bad guesses
//! burn attempts exactly like good ones.

use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_WINDOW_SECONDS: i64 = 60;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admit,
    Reject,
}

pub trait RateLimiter: Send + Sync {
    /// Record an authentication attempt for `key`. On `Reject` the caller
    /// must not touch the credential verifier.
    fn attempt(&self, key: &str, now: i64) -> RateLimitDecision;
}

#[derive(Debug)]
struct Bucket {
    window_start: i64,
    attempts: u32,
}

pub struct FixedWindowLimiter {
    window_seconds: i64,
    max_attempts: u32,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(window_seconds: i64, max_attempts: u32) -> Self {
        Self {
            window_seconds,
            max_attempts,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SECONDS, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn attempt(&self, key: &str, now: i64) -> RateLimitDecision {
        let mut buckets = self.buckets.lock().unwrap_or_else(|poisoned| {
            // A poisoned counter map is still a counter map.
            poisoned.into_inner()
        });
        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            window_start: now,
            attempts: 0,
        });
        if now - bucket.window_start >= self.window_seconds {
            bucket.window_start = now;
            bucket.attempts = 0;
        }
        if bucket.attempts >= self.max_attempts {
            return RateLimitDecision::Reject;
        }
        bucket.attempts += 1;
        RateLimitDecision::Admit
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn attempt(&self, _key: &str, _now: i64) -> RateLimitDecision {
        RateLimitDecision::Admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn admits_up_to_the_limit_then_rejects() {
        let limiter = FixedWindowLimiter::default();
        for _ in 0..5 {
            assert_eq!(
                limiter.attempt("email:a@example.com", NOW),
                RateLimitDecision::Admit
            );
        }
        assert_eq!(
            limiter.attempt("email:a@example.com", NOW),
            RateLimitDecision::Reject
        );
        // Still rejected later within the same window.
        assert_eq!(
            limiter.attempt("email:a@example.com", NOW + 59),
            RateLimitDecision::Reject
        );
    }

    #[test]
    fn window_boundary_resets_the_counter() {
        let limiter = FixedWindowLimiter::default();
        for _ in 0..5 {
            limiter.attempt("ip:1.2.3.4", NOW);
        }
        assert_eq!(
            limiter.attempt("ip:1.2.3.4", NOW + 60),
            RateLimitDecision::Admit
        );
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::default();
        for _ in 0..6 {
            limiter.attempt("email:a@example.com", NOW);
        }
        assert_eq!(
            limiter.attempt("email:b@example.com", NOW),
            RateLimitDecision::Admit
        );
    }

    #[test]
    fn configurable_bounds() {
        let limiter = FixedWindowLimiter::new(10, 1);
        assert_eq!(limiter.attempt("k", NOW), RateLimitDecision::Admit);
        assert_eq!(limiter.attempt("k", NOW + 9), RateLimitDecision::Reject);
        assert_eq!(limiter.attempt("k", NOW + 10), RateLimitDecision::Admit);
    }

    #[test]
    fn noop_rate_limiter_admits() {
        let limiter = NoopRateLimiter;
        assert_eq!(
            limiter.attempt("email:user@example.com", NOW),
            RateLimitDecision::Admit
        );
    }
}
