//! # Reconnect Policies
//!
//! Decides how long the realtime transport waits before the next connection
//! attempt, and when it stops trying.
//!
//! ## Strategies
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Retry Strategies                                │
//! │                                                                         │
//! │  FIXED (default)                    │  EXPONENTIAL                      │
//! │  ───────────────                    │  ───────────                      │
//! │  Attempt 1: 5s                      │  Attempt 1: ~500ms                │
//! │  Attempt 2: 5s                      │  Attempt 2: ~1s                   │
//! │  Attempt 3: 5s                      │  Attempt 3: ~2s                   │
//! │  ...forever unless max_attempts     │  ...capped at max_backoff         │
//! │                                                                         │
//! │  Fixed + unbounded keeps hammering the server during a long outage.    │
//! │  Set max_attempts or switch to exponential for large deployments.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A policy is created fresh for every connection loop and `reset()` after
//! every successful connection.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::time::Duration;

/// Strategy for spacing out reconnection attempts.
pub trait RetryPolicy: Send {
    /// Returns the delay before the next attempt, or `None` to give up.
    fn next_delay(&mut self) -> Option<Duration>;

    /// Called after a successful connection.
    fn reset(&mut self);
}

// =============================================================================
// Fixed Delay
// =============================================================================

/// Waits the same amount of time before every attempt.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl FixedDelay {
    /// Default delay between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    /// Creates a fixed policy. `max_attempts: None` retries forever.
    pub fn new(delay: Duration, max_attempts: Option<u32>) -> Self {
        FixedDelay {
            delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        FixedDelay::new(Self::DEFAULT_DELAY, None)
    }
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        match self.max_attempts {
            Some(max) if self.attempts > max => None,
            _ => Some(self.delay),
        }
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }
}

// =============================================================================
// Exponential Backoff
// =============================================================================

/// Capped exponential backoff with jitter.
pub struct ExponentialRetry {
    inner: ExponentialBackoff,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl ExponentialRetry {
    /// Creates an exponential policy doubling from `initial` up to `max`.
    pub fn new(initial: Duration, max: Duration, max_attempts: Option<u32>) -> Self {
        let inner = ExponentialBackoffBuilder::new()
            .with_initial_interval(initial)
            .with_max_interval(max)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        ExponentialRetry {
            inner,
            max_attempts,
            attempts: 0,
        }
    }
}

impl RetryPolicy for ExponentialRetry {
    fn next_delay(&mut self) -> Option<Duration> {
        self.attempts = self.attempts.saturating_add(1);
        if let Some(max) = self.max_attempts {
            if self.attempts > max {
                return None;
            }
        }
        self.inner.next_backoff()
    }

    fn reset(&mut self) {
        self.attempts = 0;
        self.inner.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay_is_unbounded_by_default() {
        let mut policy = FixedDelay::default();
        for _ in 0..1_000 {
            assert_eq!(policy.next_delay(), Some(Duration::from_secs(5)));
        }
        assert_eq!(policy.attempts(), 1_000);
    }

    #[test]
    fn test_fixed_delay_gives_up_and_resets() {
        let mut policy = FixedDelay::new(Duration::from_millis(100), Some(2));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert_eq!(policy.next_delay(), None);

        policy.reset();
        assert_eq!(policy.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_exponential_is_capped() {
        let max = Duration::from_secs(4);
        let mut policy = ExponentialRetry::new(Duration::from_millis(500), max, None);

        for _ in 0..50 {
            let delay = policy.next_delay().unwrap();
            // Jitter may push a single delay up to 1.5x the interval
            assert!(delay <= max.mul_f64(1.5));
        }
    }

    #[test]
    fn test_exponential_respects_max_attempts() {
        let mut policy =
            ExponentialRetry::new(Duration::from_millis(10), Duration::from_secs(1), Some(3));
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_some());
        assert!(policy.next_delay().is_none());

        policy.reset();
        assert!(policy.next_delay().is_some());
    }
}
