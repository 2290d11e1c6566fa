//! Builder for a [`Pipeline`].
//!
//! The remote collection and the handler are collaborators: tests plug in
//! fakes, the binary plugs in the Kubernetes Pod source and the logging
//! handler through [`PipelineBuilder::connect`].
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let pipeline = PipelineBuilder::new(config, shutdown_rx)
//!     .connect()
//!     .await?
//!     .build()?;
//! pipeline.run().await?;
//! ```

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::info;

use super::Pipeline;
use crate::default_controller_rate_limiter;
use crate::source::RemoteCollection;
use crate::Controller;
use crate::ControllerConfig;
use crate::Error;
use crate::Handler;
use crate::Informer;
use crate::KubePodCollection;
use crate::PodLoggingHandler;
use crate::Resource;
use crate::Result;
use crate::StateCache;
use crate::WorkQueue;

pub struct PipelineBuilder<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    config: ControllerConfig,
    source: Option<Arc<dyn RemoteCollection<K>>>,
    handler: Option<Arc<H>>,
    shutdown_signal: watch::Receiver<()>,
}

impl<K, H> PipelineBuilder<K, H>
where
    K: Resource,
    H: Handler<K>,
{
    /// `config` is expected to be validated already.
    pub fn new(
        config: ControllerConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            source: None,
            handler: None,
            shutdown_signal,
        }
    }

    /// Sets the remote collection to mirror
    pub fn source(
        mut self,
        source: Arc<dyn RemoteCollection<K>>,
    ) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the reconcile policy
    pub fn handler(
        mut self,
        handler: Arc<H>,
    ) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Assembles cache, queue, informer and controller.
    ///
    /// # Errors
    /// Returns `Error::Fatal` if no source or handler was configured.
    pub fn build(self) -> Result<Pipeline<K, H>> {
        let source = self
            .source
            .ok_or_else(|| Error::Fatal("pipeline requires a remote collection".to_string()))?;
        let handler = self
            .handler
            .ok_or_else(|| Error::Fatal("pipeline requires a handler".to_string()))?;
        let config = self.config;

        let cache = StateCache::new();
        let queue = WorkQueue::new(Box::new(default_controller_rate_limiter(&config.queue)));
        let (notify_tx, notify_rx) = mpsc::channel(config.source.event_buffer_size.max(1));

        info!(
            scope = %source.scope(),
            workers = config.queue.workers,
            resync_period = ?config.source.resync_period(),
            "pipeline built"
        );

        let informer = Informer::new(
            source,
            cache.clone(),
            notify_tx,
            config.retry.relist,
            config.source.resync_period(),
        );
        let controller = Arc::new(Controller::new(queue.clone(), cache.clone(), handler, &config.queue));

        Ok(Pipeline::new(
            config,
            informer,
            controller,
            notify_rx,
            cache,
            queue,
            self.shutdown_signal,
        ))
    }
}

impl PipelineBuilder<Pod, PodLoggingHandler> {
    /// Fills unset collaborators with the Pod source built from
    /// `config.source` and the logging handler.
    ///
    /// # Errors
    /// Returns `SourceError::Connect` when the kubeconfig can not be loaded or
    /// the endpoint is unusable.
    pub async fn connect(mut self) -> Result<Self> {
        if self.source.is_none() {
            let source_config = &self.config.source;
            let pods = KubePodCollection::connect(
                &source_config.api_server_url,
                &source_config.kubeconfig,
                &source_config.namespace,
            )
            .await?;
            self.source = Some(Arc::new(pods));
        }
        if self.handler.is_none() {
            self.handler = Some(Arc::new(PodLoggingHandler::new()));
        }
        Ok(self)
    }
}
