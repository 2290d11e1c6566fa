//! Work queue between event ingestion and the reconciliation workers.
//!
//! Delivers each pending identity to one worker at a time, collapses repeated
//! adds, and delays retries through a [`RateLimiter`].

mod rate_limiter;
mod work_queue;

pub use rate_limiter::*;
pub use work_queue::*;
