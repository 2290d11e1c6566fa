//! Watch-driven synchronisation of a [`StateCache`].
//!
//! ## Lifecycle
//! 1. `sync()`: initial full list, seeds the cache. Failure here is a startup error.
//! 2. `run()`: consume the change stream, applying each delta in delivery order.
//! 3. Stream error / end / resync tick: full relist (with backoff) then watch again.
//!    Relisting never gives up; only shutdown or a closed channel ends `run()`.
//!
//! Every accepted delta is forwarded as a [`Notification`] over a bounded
//! channel; the informer never touches the work queue directly.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::time::Interval;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Notification;
use super::StateCache;
use crate::metrics;
use crate::source::ObjectList;
use crate::source::RemoteCollection;
use crate::source::WatchEvent;
use crate::utils::async_task::backoff_delay;
use crate::utils::async_task::task_with_timeout_and_exponential_backoff;
use crate::utils::async_task::with_jitter;
use crate::BackoffPolicy;
use crate::Error;
use crate::Resource;
use crate::Result;
use crate::SystemError;

/// Why a watch session ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WatchOutcome {
    Shutdown,
    Interrupted(String),
    ResyncDue,
}

pub struct Informer<K: Resource> {
    source: Arc<dyn RemoteCollection<K>>,
    cache: StateCache<K>,
    notify_tx: mpsc::Sender<Notification>,
    relist_policy: BackoffPolicy,
    resync_period: Option<Duration>,

    /// Version the next watch resumes from
    resource_version: Option<String>,

    /// Consecutive watch calls refused by the source
    watch_refusals: usize,
}

impl<K: Resource> Informer<K> {
    pub fn new(
        source: Arc<dyn RemoteCollection<K>>,
        cache: StateCache<K>,
        notify_tx: mpsc::Sender<Notification>,
        relist_policy: BackoffPolicy,
        resync_period: Option<Duration>,
    ) -> Self {
        Self {
            source,
            cache,
            notify_tx,
            relist_policy,
            resync_period,
            resource_version: None,
            watch_refusals: 0,
        }
    }

    pub fn cache(&self) -> StateCache<K> {
        self.cache.clone()
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.resource_version.as_deref()
    }

    /// Initial full list. Errors are returned to the caller untouched.
    pub async fn sync(&mut self) -> Result<()> {
        let list = self.source.list().await?;
        self.apply_listing(list).await
    }

    /// Runs the watch/relist cycle until `shutdown` fires.
    pub async fn run(
        mut self,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<()> {
        let scope = self.source.scope();
        info!(%scope, "informer started");

        loop {
            match self.watch_until_interrupted(&mut shutdown).await {
                WatchOutcome::Shutdown => break,
                WatchOutcome::Interrupted(reason) => {
                    warn!(%scope, %reason, "watch interrupted, relisting");
                }
                WatchOutcome::ResyncDue => {
                    debug!(%scope, "periodic resync due, relisting");
                }
            }

            if self.relist_until_synced(&mut shutdown).await.is_err() {
                break;
            }
        }

        info!(%scope, "informer stopped");
        Ok(())
    }

    pub(crate) async fn watch_until_interrupted(
        &mut self,
        shutdown: &mut watch::Receiver<()>,
    ) -> WatchOutcome {
        let mut stream = match self.source.watch(self.resource_version.clone()).await {
            Ok(stream) => stream,
            Err(e) => {
                // No hot list/watch loop against a source refusing watches
                let pause = with_jitter(backoff_delay(&self.relist_policy, self.watch_refusals));
                self.watch_refusals += 1;
                tokio::select! {
                    _ = shutdown.changed() => return WatchOutcome::Shutdown,
                    _ = tokio::time::sleep(pause) => return WatchOutcome::Interrupted(e.to_string()),
                }
            }
        };
        self.watch_refusals = 0;
        let mut ticker = self
            .resync_period
            .map(|period| tokio::time::interval_at(tokio::time::Instant::now() + period, period));

        loop {
            tokio::select! {
                _ = shutdown.changed() => return WatchOutcome::Shutdown,
                _ = next_tick(&mut ticker) => return WatchOutcome::ResyncDue,
                event = stream.next() => match event {
                    Some(Ok(event)) => {
                        if let Err(e) = self.handle_event(event).await {
                            debug!(error = %e, "notification channel closed");
                            return WatchOutcome::Shutdown;
                        }
                    }
                    Some(Err(e)) => return WatchOutcome::Interrupted(e.to_string()),
                    None => return WatchOutcome::Interrupted("watch stream closed".to_string()),
                }
            }
        }
    }

    /// Applies one delta to the cache and forwards the resulting notification.
    ///
    /// Only a closed notification channel is reported as an error; identity
    /// failures drop the single event.
    pub(crate) async fn handle_event(
        &mut self,
        event: WatchEvent<K>,
    ) -> Result<()> {
        let applied = match event {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) => {
                self.observe_version(obj.resource_version());
                self.cache.apply_upsert(obj)
            }
            WatchEvent::Deleted(deleted) => self.cache.apply_delete(&deleted),
            WatchEvent::Bookmark(version) => {
                self.resource_version = Some(version);
                return Ok(());
            }
        };

        match applied {
            Ok(Some(notification)) => self.emit(notification).await,
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "dropping event without resolvable identity");
                metrics::DROPPED_EVENTS.inc();
                Ok(())
            }
        }
    }

    /// Relists until one succeeds.
    ///
    /// Each round is bounded by the relist policy; an exhausted round waits
    /// `max_delay_ms` and starts over. Errors only on shutdown or a closed
    /// notification channel.
    async fn relist_until_synced(
        &mut self,
        shutdown: &mut watch::Receiver<()>,
    ) -> Result<()> {
        loop {
            match self.relist(shutdown).await {
                Ok(()) => return Ok(()),
                Err(e @ Error::System(SystemError::Shutdown)) | Err(e @ Error::System(SystemError::ChannelClosed)) => {
                    return Err(e)
                }
                Err(e) => {
                    warn!(scope = %self.source.scope(), error = %e, "relist failed, retrying");
                    let pause = with_jitter(Duration::from_millis(self.relist_policy.max_delay_ms));
                    tokio::select! {
                        _ = shutdown.changed() => return Err(SystemError::Shutdown.into()),
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
            }
        }
    }

    async fn relist(
        &mut self,
        shutdown: &mut watch::Receiver<()>,
    ) -> Result<()> {
        let source = self.source.clone();
        let list = task_with_timeout_and_exponential_backoff(
            move || {
                let source = source.clone();
                async move { source.list().await }
            },
            self.relist_policy,
            shutdown,
        )
        .await?;

        metrics::RELISTS.inc();
        self.apply_listing(list).await
    }

    async fn apply_listing(
        &mut self,
        list: ObjectList<K>,
    ) -> Result<()> {
        let count = list.items.len();
        self.resource_version = list.resource_version;

        let notifications = self.cache.replace(list.items);
        info!(
            scope = %self.source.scope(),
            objects = count,
            resource_version = ?self.resource_version,
            "cache synced"
        );

        for notification in notifications {
            self.emit(notification).await?;
        }
        Ok(())
    }

    async fn emit(
        &self,
        notification: Notification,
    ) -> Result<()> {
        self.notify_tx
            .send(notification)
            .await
            .map_err(|_| SystemError::ChannelClosed.into())
    }

    fn observe_version(
        &mut self,
        version: Option<&str>,
    ) {
        if let Some(version) = version {
            self.resource_version = Some(version.to_string());
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
