use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::metrics;
use crate::utils::async_task::spawn_task;
use crate::Handler;
use crate::HandlerError;
use crate::QueueConfig;
use crate::Resource;
use crate::Result;
use crate::StateCache;
use crate::WorkQueue;

/// Which handler call a reconcile resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileKind {
    Created,
    Updated,
    Deleted,
}

impl ReconcileKind {
    fn as_str(&self) -> &'static str {
        match self {
            ReconcileKind::Created => "create",
            ReconcileKind::Updated => "update",
            ReconcileKind::Deleted => "delete",
        }
    }
}

/// What happened to one dequeued identity.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Reconciled(ReconcileKind),
    Requeued,
    /// Retry budget exhausted; identity forgotten until its next change
    Dropped,
}

pub struct Controller<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    queue: WorkQueue,
    cache: StateCache<K>,
    handler: Arc<H>,

    /// Last state successfully delivered to the handler, per identity
    observed: DashMap<String, K>,

    workers: usize,
    max_retries: u32,
}

impl<K, H> Controller<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    pub fn new(
        queue: WorkQueue,
        cache: StateCache<K>,
        handler: Arc<H>,
        config: &QueueConfig,
    ) -> Self {
        Self {
            queue,
            cache,
            handler,
            observed: DashMap::new(),
            workers: config.workers.max(1),
            max_retries: config.max_retries,
        }
    }

    pub fn queue(&self) -> &WorkQueue {
        &self.queue
    }

    /// Runs `Handler::init`, then the worker pool until `shutdown` fires.
    ///
    /// On shutdown the queue stops handing out identities; handler calls in
    /// progress run to completion before this returns.
    pub async fn run(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        self.handler.init().await?;

        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let this = self.clone();
            spawn_task(
                &format!("worker-{}", id),
                move || async move {
                    this.run_worker(id).await;
                    Ok(())
                },
                Some(&mut handles),
            );
        }
        info!(workers = self.workers, "controller started");

        // A dropped sender also means shutdown
        let _ = shutdown.changed().await;
        warn!("[Controller] shutdown signal received.");

        self.queue.shut_down();
        for handle in handles {
            if let Err(e) = handle.await {
                error!("worker panicked: {:?}", e);
            }
        }

        info!("controller stopped");
        Ok(())
    }

    async fn run_worker(
        &self,
        id: usize,
    ) {
        debug!(worker = id, "worker started");
        while self.process_next_item().await.is_some() {}
        debug!(worker = id, "worker stopped");
    }

    /// Takes one identity off the queue and drives it to an outcome.
    ///
    /// Returns `None` once the queue is shut down.
    pub(crate) async fn process_next_item(&self) -> Option<ItemOutcome> {
        let key = self.queue.get().await?;
        let started = Instant::now();

        let outcome = match self.reconcile(&key).await {
            Ok(kind) => {
                self.queue.forget(&key);
                metrics::observe_reconcile("success", kind.as_str(), elapsed_ms(started));
                debug!(%key, kind = kind.as_str(), "reconciled");
                ItemOutcome::Reconciled(kind)
            }
            Err((kind, e)) => {
                metrics::observe_reconcile("error", kind.as_str(), elapsed_ms(started));
                self.handle_failure(&key, e)
            }
        };

        self.queue.done(&key);
        Some(outcome)
    }

    fn handle_failure(
        &self,
        key: &str,
        e: crate::Error,
    ) -> ItemOutcome {
        let requeues = self.queue.num_requeues(key);
        if self.max_retries != 0 && requeues >= self.max_retries {
            error!(%key, retries = requeues, error = %e, "giving up on object after repeated failures");
            self.queue.forget(key);
            return ItemOutcome::Dropped;
        }

        warn!(%key, attempt = requeues + 1, error = %e, "reconcile failed, requeueing");
        self.queue.add_rate_limited(key);
        ItemOutcome::Requeued
    }

    /// Resolves `key` against the cache and calls the matching handler method.
    async fn reconcile(
        &self,
        key: &str,
    ) -> std::result::Result<ReconcileKind, (ReconcileKind, crate::Error)> {
        match self.cache.get(key) {
            Some(current) => {
                let previous = self.observed.get(key).map(|entry| entry.value().clone());
                let kind = match previous {
                    None => {
                        guarded(key, ReconcileKind::Created, self.handler.object_created(&current)).await?;
                        ReconcileKind::Created
                    }
                    Some(old) => {
                        guarded(key, ReconcileKind::Updated, self.handler.object_updated(&old, &current)).await?;
                        ReconcileKind::Updated
                    }
                };
                self.observed.insert(key.to_string(), current);
                Ok(kind)
            }
            None => {
                let last_known = self.observed.get(key).map(|entry| entry.value().clone());
                guarded(key, ReconcileKind::Deleted, self.handler.object_deleted(key, last_known)).await?;
                self.observed.remove(key);
                Ok(ReconcileKind::Deleted)
            }
        }
    }

    /// Number of identities whose state the handler has seen.
    pub fn observed_len(&self) -> usize {
        self.observed.len()
    }
}

/// Awaits one handler call; a panic counts as a failed attempt.
async fn guarded<F>(
    key: &str,
    kind: ReconcileKind,
    call: F,
) -> std::result::Result<(), (ReconcileKind, crate::Error)>
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result.map_err(|e| (kind, e)),
        Err(payload) => Err((
            kind,
            HandlerError::Panicked {
                key: key.to_string(),
                message: panic_message(payload.as_ref()),
            }
            .into(),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
