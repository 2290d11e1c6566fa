//! Requeue delay policies.
//!
//! [`RateLimiter::when`] is called once per failed attempt and both records the
//! failure and returns how long to wait before the item is re-added.
//! [`RateLimiter::forget`] is called after a success and clears the record.

use std::time::Duration;

use dashmap::DashMap;
#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::QueueConfig;

#[cfg_attr(test, automock)]
pub trait RateLimiter: Send + Sync + 'static {
    /// Records a failure for `key` and returns the delay before its retry.
    fn when(
        &self,
        key: &str,
    ) -> Duration;

    /// Clears the failure history of `key`.
    fn forget(
        &self,
        key: &str,
    );

    /// Consecutive failures recorded for `key`.
    fn num_requeues(
        &self,
        key: &str,
    ) -> u32;
}

/// Per-item exponential backoff: `base * 2^failures`, capped at `max`.
pub struct ItemExponentialFailureRateLimiter {
    failures: DashMap<String, u32>,
    base_delay: Duration,
    max_delay: Duration,
}

impl ItemExponentialFailureRateLimiter {
    pub fn new(
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            failures: DashMap::new(),
            base_delay,
            max_delay,
        }
    }
}

impl RateLimiter for ItemExponentialFailureRateLimiter {
    fn when(
        &self,
        key: &str,
    ) -> Duration {
        let exp = {
            let mut count = self.failures.entry(key.to_string()).or_insert(0);
            let exp = *count;
            *count = count.saturating_add(1);
            exp
        };

        // 2^exp overflows long before the cap matters
        let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map(|delay| delay.min(self.max_delay))
            .unwrap_or(self.max_delay)
    }

    fn forget(
        &self,
        key: &str,
    ) {
        self.failures.remove(key);
    }

    fn num_requeues(
        &self,
        key: &str,
    ) -> u32 {
        self.failures.get(key).map(|count| *count).unwrap_or(0)
    }
}

/// Overall token bucket shared by all items.
///
/// Holds at most `burst` tokens refilled at `qps` per second. Every call to
/// `when` reserves one token; the returned delay is how long until that token
/// exists.
pub struct BucketRateLimiter {
    qps: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last: Instant,
}

impl BucketRateLimiter {
    pub fn new(
        qps: f64,
        burst: u32,
    ) -> Self {
        Self {
            qps,
            burst: burst as f64,
            state: Mutex::new(BucketState {
                tokens: burst as f64,
                last: Instant::now(),
            }),
        }
    }
}

impl RateLimiter for BucketRateLimiter {
    fn when(
        &self,
        _key: &str,
    ) -> Duration {
        if self.qps <= 0.0 {
            return Duration::ZERO;
        }

        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(state.last).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst);
        state.last = now;

        state.tokens -= 1.0;
        if state.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-state.tokens / self.qps)
        }
    }

    fn forget(
        &self,
        _key: &str,
    ) {
    }

    fn num_requeues(
        &self,
        _key: &str,
    ) -> u32 {
        0
    }
}

/// Delegates to every child and waits for the longest delay.
pub struct MaxOfRateLimiter {
    limiters: Vec<Box<dyn RateLimiter>>,
}

impl MaxOfRateLimiter {
    pub fn new(limiters: Vec<Box<dyn RateLimiter>>) -> Self {
        Self { limiters }
    }
}

impl RateLimiter for MaxOfRateLimiter {
    fn when(
        &self,
        key: &str,
    ) -> Duration {
        self.limiters
            .iter()
            .map(|limiter| limiter.when(key))
            .max()
            .unwrap_or(Duration::ZERO)
    }

    fn forget(
        &self,
        key: &str,
    ) {
        for limiter in &self.limiters {
            limiter.forget(key);
        }
    }

    fn num_requeues(
        &self,
        key: &str,
    ) -> u32 {
        self.limiters
            .iter()
            .map(|limiter| limiter.num_requeues(key))
            .max()
            .unwrap_or(0)
    }
}

/// Per-item exponential backoff combined with an overall token bucket.
pub fn default_controller_rate_limiter(config: &QueueConfig) -> MaxOfRateLimiter {
    MaxOfRateLimiter::new(vec![
        Box::new(ItemExponentialFailureRateLimiter::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )),
        Box::new(BucketRateLimiter::new(config.qps, config.burst)),
    ])
}
