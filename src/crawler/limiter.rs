//! Per-host rate limiting
//!
//! Each host gets its own token bucket (burst 1) created on first use.
//! Waiting is cancellation-aware.

use crate::crawler::FetchError;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

type HostRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Token-bucket rate limiter keyed by host
///
/// Calls for the same host serialize at the configured rate; calls for
/// different hosts never wait on each other. Buckets start full, so the
/// first request to any host proceeds immediately.
pub struct DomainLimiter {
    quota: Quota,
    limiters: Mutex<HashMap<String, Arc<HostRateLimiter>>>,
}

impl DomainLimiter {
    /// Creates a limiter allowing `requests_per_second` per host
    ///
    /// Non-positive or non-finite rates fall back to one request per second.
    pub fn new(requests_per_second: f64) -> Self {
        let rate = if requests_per_second.is_finite() && requests_per_second > 0.0 {
            requests_per_second
        } else {
            1.0
        };

        let quota = Quota::with_period(Duration::from_secs_f64(1.0 / rate))
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX))
            .allow_burst(NonZeroU32::MIN);

        Self {
            quota,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// Blocks until a token for `domain` is available
    ///
    /// # Returns
    ///
    /// * `Ok(())` - A token was taken
    /// * `Err(FetchError::Cancelled)` - `cancel` fired first (or had already fired)
    pub async fn wait(&self, cancel: &CancellationToken, domain: &str) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let limiter = self.limiter_for(domain);

        tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            _ = limiter.until_ready() => Ok(()),
        }
    }

    /// Number of hosts that have a bucket
    pub fn tracked_domains(&self) -> usize {
        self.limiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn limiter_for(&self, domain: &str) -> Arc<HostRateLimiter> {
        let mut limiters = self.limiters.lock().unwrap_or_else(PoisonError::into_inner);
        limiters
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota)))
            .clone()
    }
}
