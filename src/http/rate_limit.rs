//! Rate limiting implementation
//!
//! Uses the governor crate for token bucket rate limiting. Workspace APIs
//! throttle clients above a few dozen requests per second, so the default
//! stays well below that.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Default requests per second against a workspace
pub const DEFAULT_RATE_LIMIT: u32 = 15;

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::per_second(DEFAULT_RATE_LIMIT)
    }
}

impl RateLimiterConfig {
    /// Limit to `n` requests per second with a burst of the same size
    pub fn per_second(n: u32) -> Self {
        Self {
            requests_per_second: n,
            burst_size: None,
        }
    }

    /// Set the burst size
    #[must_use]
    pub fn burst(mut self, burst: u32) -> Self {
        self.burst_size = Some(burst);
        self
    }

    fn quota(&self) -> Quota {
        let rate = NonZeroU32::new(self.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = self
            .burst_size
            .and_then(NonZeroU32::new)
            .unwrap_or(rate);
        Quota::per_second(rate).allow_burst(burst)
    }
}

/// Token bucket shared by all requests of one client
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
        }
    }

    /// Wait until a request may be sent
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Take a permit if one is available right now
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

#[cfg(test)]
mod rate_limit_tests {
    use super::*;

    #[test]
    fn test_rate_limiter_config_default() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_second, 15);
        assert_eq!(config.burst_size, None);
    }

    #[test]
    fn test_rate_limiter_config_yaml() {
        let config: RateLimiterConfig =
            serde_yaml::from_str("requests_per_second: 5\nburst_size: 2").unwrap();
        assert_eq!(config, RateLimiterConfig::per_second(5).burst(2));
    }

    #[tokio::test]
    async fn test_rate_limiter_burst_then_throttle() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_second(1).burst(3));

        for _ in 0..3 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[tokio::test]
    async fn test_rate_limiter_zero_rate_is_clamped() {
        let limiter = RateLimiter::new(&RateLimiterConfig::per_second(0));
        limiter.wait().await;
    }
}
