use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Work queue and worker pool settings.
///
/// Retry delays follow the default controller rate limiter: the larger of a
/// per-item exponential backoff and an overall token bucket.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Number of concurrent reconcile workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-item backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-item backoff cap (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Overall retry rate (tokens per second). 0 disables the bucket.
    #[serde(default = "default_qps")]
    pub qps: f64,

    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Give up on an identity after this many consecutive failures.
    /// 0 means retry forever.
    #[serde(default)]
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            qps: default_qps(),
            burst: default_burst(),
            max_retries: 0,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".into()));
        }

        if self.base_delay_ms == 0 {
            return Err(Error::InvalidConfig("base_delay_ms must be > 0".into()));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::InvalidConfig(format!(
                "base_delay_ms {} exceeds max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            )));
        }

        if self.qps < 0.0 || !self.qps.is_finite() {
            return Err(Error::InvalidConfig(format!("qps {} must be a non-negative number", self.qps)));
        }

        if self.qps > 0.0 && self.burst == 0 {
            return Err(Error::InvalidConfig("burst must be > 0 when qps is set".into()));
        }

        Ok(())
    }
}

fn default_workers() -> usize {
    1
}
fn default_base_delay_ms() -> u64 {
    5
}
fn default_max_delay_ms() -> u64 {
    1_000_000
}
fn default_qps() -> f64 {
    10.0
}
fn default_burst() -> u32 {
    100
}
