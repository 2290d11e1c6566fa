//! Deduplicating, rate-limited work queue.
//!
//! ## Item states
//! ```text
//!           add              get                 done
//!  (none) -------> dirty+queued -----> processing -------> (none)
//!                                  |                ^
//!                             add  v                | done re-queues
//!                           processing+dirty -------+
//! ```
//! - `dirty`: pending delivery. An identity is queued at most once.
//! - `processing`: held by exactly one worker between `get` and `done`.
//! - An `add` while processing only marks the identity dirty; `done` puts it
//!   back in the queue so the update is not lost.
//!
//! Only identities travel through the queue. Workers re-read current state.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

use super::RateLimiter;
use crate::metrics;

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    shutting_down: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    notify: Notify,
    rate_limiter: Box<dyn RateLimiter>,
    /// Flips once on shutdown; cancels pending delayed adds
    shutdown_tx: watch::Sender<bool>,
}

/// Cheap-clone handle to a shared queue.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<QueueInner>,
}

impl WorkQueue {
    pub fn new(rate_limiter: Box<dyn RateLimiter>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                rate_limiter,
                shutdown_tx,
            }),
        }
    }

    /// Marks `key` as needing processing. Idempotent while pending.
    pub fn add(
        &self,
        key: &str,
    ) {
        let mut state = self.inner.state.lock();
        if state.shutting_down {
            return;
        }
        if !state.dirty.insert(key.to_string()) {
            trace!(%key, "already pending");
            return;
        }
        metrics::QUEUE_ADDS.inc();
        if state.processing.contains(key) {
            trace!(%key, "in flight, will be re-queued on done");
            return;
        }
        state.queue.push_back(key.to_string());
        metrics::QUEUE_DEPTH.set(state.queue.len() as i64);
        drop(state);

        self.inner.notify.notify_one();
    }

    /// Waits for the next identity and marks it as processing.
    ///
    /// Returns `None` once the queue is shutting down; identities still queued
    /// at that point are abandoned.
    pub async fn get(&self) -> Option<String> {
        loop {
            // Register interest before checking so a concurrent add or
            // shutdown between the check and the await is not missed.
            let notified = self.inner.notify.notified();
            {
                let mut state = self.inner.state.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    metrics::QUEUE_DEPTH.set(state.queue.len() as i64);
                    let more = !state.queue.is_empty();
                    drop(state);

                    if more {
                        self.inner.notify.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Releases `key`. If it was re-added while processing it is queued again.
    pub fn done(
        &self,
        key: &str,
    ) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.to_string());
            metrics::QUEUE_DEPTH.set(state.queue.len() as i64);
            drop(state);
            self.inner.notify.notify_one();
        }
    }

    /// Adds `key` after `delay`. Pending delayed adds are dropped on shutdown.
    pub fn add_after(
        &self,
        key: &str,
        delay: Duration,
    ) {
        if self.is_shutting_down() {
            return;
        }
        if delay.is_zero() {
            self.add(key);
            return;
        }

        let queue = self.clone();
        let key = key.to_string();
        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => queue.add(&key),
                _ = shutdown_rx.changed() => {}
            }
        });
    }

    /// Re-adds `key` after the delay its rate limiter computes.
    pub fn add_rate_limited(
        &self,
        key: &str,
    ) {
        let delay = self.inner.rate_limiter.when(key);
        debug!(%key, ?delay, "requeue with backoff");
        metrics::QUEUE_RETRIES.inc();
        self.add_after(key, delay);
    }

    /// Clears the retry history of `key`.
    pub fn forget(
        &self,
        key: &str,
    ) {
        self.inner.rate_limiter.forget(key);
    }

    pub fn num_requeues(
        &self,
        key: &str,
    ) -> u32 {
        self.inner.rate_limiter.num_requeues(key)
    }

    /// Number of identities waiting for a worker.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of identities currently held by workers.
    pub fn processing_len(&self) -> usize {
        self.inner.state.lock().processing.len()
    }

    /// Stops accepting items and wakes every blocked `get`.
    pub fn shut_down(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;
        }
        self.inner.shutdown_tx.send_replace(true);
        self.inner.notify.notify_waiters();
        debug!("work queue shut down");
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }
}
