// src/backoff.rs

//! Exponential backoff for failing trigger attempts.
//!
//! `delay(n) = min(base * 2^(n-1), cap)`, with `base = 5s` and `cap = 60s`
//! by default. The policy itself is a pure function; [`Backoff`] carries the
//! attempt counter for one watcher instance.

use std::time::Duration;

pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_CAP_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_CAP_DELAY)
    }
}

impl BackoffPolicy {
    /// `cap` is raised to `base` if it is smaller.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap: cap.max(base),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn cap(&self) -> Duration {
        self.cap
    }

    /// Delay before the retry that follows failed attempt number `attempt`
    /// (1-based; 0 is treated as 1). Saturates at `cap` instead of overflowing.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let factor = 1u32.checked_shl(exponent).filter(|f| *f != 0);
        match factor.and_then(|f| self.base.checked_mul(f)) {
            Some(delay) => delay.min(self.cap),
            None => self.cap,
        }
    }
}

/// Attempt counter for one watcher.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: BackoffPolicy,
    attempt: u32,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, attempt: 1 }
    }

    /// The attempt number the next failure will be recorded as.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failure and return `(attempt, delay)` for it.
    pub fn next_delay(&mut self) -> (u32, Duration) {
        let attempt = self.attempt;
        let delay = self.policy.delay(attempt);
        self.attempt = self.attempt.saturating_add(1);
        (attempt, delay)
    }

    pub fn reset(&mut self) {
        self.attempt = 1;
    }
}
