use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;
use tokio::time::sleep;
use tokio::time::timeout;
use tracing::error;
use tracing::warn;

use crate::BackoffPolicy;
use crate::Result;
use crate::SystemError;

/// Retries `task` with capped exponential backoff until it succeeds, the
/// policy's retry budget runs out, or `shutdown` fires.
///
/// `max_retries == 0` retries forever; `timeout_ms == 0` disables the
/// per-attempt timeout.
pub(crate) async fn task_with_timeout_and_exponential_backoff<F, T, P>(
    task: F,
    policy: BackoffPolicy,
    shutdown: &mut watch::Receiver<()>,
) -> Result<P>
where
    F: Fn() -> T,
    T: std::future::Future<Output = Result<P>>,
{
    let mut attempts = 0;

    loop {
        let outcome = if policy.timeout_ms == 0 {
            task().await
        } else {
            let limit = Duration::from_millis(policy.timeout_ms);
            match timeout(limit, task()).await {
                Ok(result) => result,
                Err(_) => Err(SystemError::RetryTimeout(limit).into()),
            }
        };

        match outcome {
            Ok(r) => return Ok(r),
            Err(e) => warn!(attempt = attempts + 1, "task failed with error: {:?}", e),
        }

        attempts += 1;
        if policy.max_retries != 0 && attempts >= policy.max_retries {
            warn!("Task failed after {} retries", attempts);
            return Err(SystemError::RetryExhausted(attempts).into());
        }

        tokio::select! {
            _ = shutdown.changed() => return Err(SystemError::Shutdown.into()),
            _ = sleep(with_jitter(backoff_delay(&policy, attempts - 1))) => {}
        }
    }
}

/// `base_delay_ms * 2^attempt`, capped at `max_delay_ms`.
pub(crate) fn backoff_delay(
    policy: &BackoffPolicy,
    attempt: usize,
) -> Duration {
    let max_delay = Duration::from_millis(policy.max_delay_ms);
    let factor = 2u32.saturating_pow(attempt.min(31) as u32);
    Duration::from_millis(policy.base_delay_ms)
        .checked_mul(factor)
        .map_or(max_delay, |delay| delay.min(max_delay))
}

/// Adds up to 10% random jitter so that many clients do not relist in lockstep.
pub(crate) fn with_jitter(delay: Duration) -> Duration {
    let spread = delay.as_millis() as u64 / 10;
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

// Helper function to spawn tasks and track their JoinHandles
pub(crate) fn spawn_task<F, Fut>(
    name: &str,
    task_fn: F,
    handles: Option<&mut Vec<tokio::task::JoinHandle<()>>>,
) where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    let handle = tokio::spawn(async move {
        if let Err(e) = task_fn().await {
            error!("spawned task: {name} stopped or encountered an error: {:?}", e);
        }
    });

    if let Some(h) = handles {
        h.push(handle);
    }
}
