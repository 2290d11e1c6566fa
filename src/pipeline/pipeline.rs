use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::error;
use tracing::info;

use crate::metrics;
use crate::route_notifications;
use crate::utils::async_task::spawn_task;
use crate::Controller;
use crate::ControllerConfig;
use crate::Handler;
use crate::Informer;
use crate::Notification;
use crate::Resource;
use crate::Result;
use crate::StateCache;
use crate::WorkQueue;

/// A fully wired pipeline, ready to run.
pub struct Pipeline<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    config: ControllerConfig,
    informer: Informer<K>,
    controller: Arc<Controller<K, H>>,
    notify_rx: mpsc::Receiver<Notification>,
    cache: StateCache<K>,
    queue: WorkQueue,
    shutdown_signal: watch::Receiver<()>,
}

impl<K, H> Pipeline<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    pub(super) fn new(
        config: ControllerConfig,
        informer: Informer<K>,
        controller: Arc<Controller<K, H>>,
        notify_rx: mpsc::Receiver<Notification>,
        cache: StateCache<K>,
        queue: WorkQueue,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            informer,
            controller,
            notify_rx,
            cache,
            queue,
            shutdown_signal,
        }
    }

    pub fn cache(&self) -> StateCache<K> {
        self.cache.clone()
    }

    pub fn queue(&self) -> WorkQueue {
        self.queue.clone()
    }

    /// Runs every stage until the shutdown signal fires.
    ///
    /// 1. Starts the router so the initial listing can be enqueued
    /// 2. Initial sync; an error here is a startup failure and is returned
    /// 3. Starts the metrics endpoint (if enabled) and the informer
    /// 4. Runs the controller in place; it returns once in-flight handler
    ///    calls have finished
    pub async fn run(self) -> Result<()> {
        let Pipeline {
            config,
            mut informer,
            controller,
            notify_rx,
            queue,
            shutdown_signal,
            ..
        } = self;

        let mut handles: Vec<JoinHandle<()>> = Vec::new();

        let router_shutdown = shutdown_signal.clone();
        spawn_task(
            "router",
            move || route_notifications(notify_rx, queue, router_shutdown),
            Some(&mut handles),
        );

        if let Err(e) = informer.sync().await {
            error!("initial sync failed: {}", e);
            return Err(e);
        }
        info!(resource_version = ?informer.resource_version(), "initial sync complete");

        if config.monitoring.prometheus_enabled {
            let port = config.monitoring.prometheus_port;
            let metrics_shutdown = shutdown_signal.clone();
            tokio::spawn(async move {
                if let Err(e) = metrics::start_server(port, metrics_shutdown).await {
                    error!("metrics endpoint unavailable: {}", e);
                }
            });
        }

        let informer_shutdown = shutdown_signal.clone();
        spawn_task(
            "informer",
            move || informer.run(informer_shutdown),
            Some(&mut handles),
        );

        let result = controller.run(shutdown_signal).await;
        if let Err(e) = &result {
            // Handler init refused to start; nothing will ever drain the queue
            error!("controller failed: {}", e);
            for handle in &handles {
                handle.abort();
            }
            return result;
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("pipeline task panicked: {:?}", e);
            }
        }
        info!("pipeline stopped");
        result
    }
}
