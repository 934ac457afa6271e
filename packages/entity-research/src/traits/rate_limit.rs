//! Call-rate budget shared by every external call.
//!
//! Components receive a [`RateLimit`] and call [`RateLimit::acquire`] before
//! each search or completion request. There is no global limiter; tests pass
//! [`NoRateLimit`].

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::{ResearchError, Result};

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Acquire-before-call capability.
#[async_trait]
pub trait RateLimit: Send + Sync {
    /// Wait until one more external call is allowed.
    async fn acquire(&self);
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRateLimit;

#[async_trait]
impl RateLimit for NoRateLimit {
    async fn acquire(&self) {}
}

/// Token-bucket limiter backed by the governor crate.
///
/// Clones share one bucket.
#[derive(Clone)]
pub struct GovernorRateLimit {
    limiter: Arc<DirectRateLimiter>,
}

impl GovernorRateLimit {
    /// Allow `requests_per_second` sustained calls.
    pub fn per_second(requests_per_second: u32) -> Result<Self> {
        let rps = NonZeroU32::new(requests_per_second)
            .ok_or_else(|| ResearchError::config("requests_per_second must be > 0"))?;
        Ok(Self::with_quota(Quota::per_second(rps)))
    }

    /// Allow `requests_per_minute` sustained calls with bursts up to `burst`.
    pub fn per_minute_with_burst(requests_per_minute: u32, burst: u32) -> Result<Self> {
        let rpm = NonZeroU32::new(requests_per_minute)
            .ok_or_else(|| ResearchError::config("requests_per_minute must be > 0"))?;
        let burst = NonZeroU32::new(burst)
            .ok_or_else(|| ResearchError::config("burst must be > 0"))?;
        Ok(Self::with_quota(Quota::per_minute(rpm).allow_burst(burst)))
    }

    /// Create with a custom quota.
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Conservative model-API budget: 48 calls/minute, bursts of 10.
    pub fn conservative() -> Self {
        Self::with_quota(Quota::per_minute(nonzero!(48u32)).allow_burst(nonzero!(10u32)))
    }
}

impl Default for GovernorRateLimit {
    fn default() -> Self {
        Self::conservative()
    }
}

#[async_trait]
impl RateLimit for GovernorRateLimit {
    async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}
