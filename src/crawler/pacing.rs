//! Aggregate request-rate ceiling
//!
//! Per-request politeness delays are applied by each caller. The pacer adds
//! a ceiling on the combined request rate of every worker sharing it, so
//! raising the worker count cannot raise the request rate past the
//! configured maximum.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Hands out request permits at most once per `min_interval`
#[derive(Clone)]
pub struct Pacer {
    min_interval: Duration,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl fmt::Debug for Pacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pacer")
            .field("min_interval", &self.min_interval)
            .field("limited", &self.limiter.is_some())
            .finish()
    }
}

impl Pacer {
    /// Creates a pacer allowing at most `requests_per_second` requests
    pub fn per_second(requests_per_second: f64) -> Self {
        if !requests_per_second.is_finite() || requests_per_second <= 0.0 {
            return Self::unlimited();
        }
        Self::with_interval(Duration::from_secs_f64(1.0 / requests_per_second))
    }

    /// Sub-1 rates come through here as periods longer than a second
    pub fn with_interval(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self {
            min_interval: if limiter.is_some() { min_interval } else { Duration::ZERO },
            limiter,
        }
    }

    /// A pacer that never waits
    pub fn unlimited() -> Self {
        Self {
            min_interval: Duration::ZERO,
            limiter: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the shared limiter grants the next permit
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
