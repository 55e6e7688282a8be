//! Bounded retry policy for the fetcher
//!
//! The backoff function is a strategy object so tests can swap in a zero
//! delay and exercise the retry loop without real sleeps.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Computes the pause after a failed attempt
pub trait BackoffStrategy: Send + Sync + fmt::Debug {
    /// Delay to wait after attempt number `attempt` (1-based) has failed
    fn delay(&self, attempt: u32) -> Duration;
}

/// `base * attempt`: 1.5s, 3s, 4.5s, ... for a 1.5s base
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    base: Duration,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl BackoffStrategy for LinearBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt)
    }
}

/// Retries immediately
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBackoff;

impl BackoffStrategy for NoBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Maximum attempts per URL and the backoff between them
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Arc<dyn BackoffStrategy>,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least one attempt
    pub fn new(max_attempts: u32, backoff: Arc<dyn BackoffStrategy>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, Arc::new(LinearBackoff::new(base)))
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Arc::new(NoBackoff))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause to take after `attempt` failed, or `None` if no attempts remain
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            None
        } else {
            Some(self.backoff.delay(attempt))
        }
    }
}
