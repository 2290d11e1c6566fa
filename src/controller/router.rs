use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::info;

use crate::Notification;
use crate::Result;
use crate::WorkQueue;

/// Moves cache notifications into the work queue until shutdown or until the
/// informer drops its sender.
///
/// Only the identity is enqueued; workers re-read current state, so several
/// notifications for one identity collapse into a single pending item.
pub async fn route_notifications(
    mut notify_rx: mpsc::Receiver<Notification>,
    queue: WorkQueue,
    mut shutdown: watch::Receiver<()>,
) -> Result<()> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                debug!("[Router] shutdown signal received.");
                break;
            }
            notification = notify_rx.recv() => match notification {
                Some(Notification { kind, key }) => {
                    info!("{}: {}", kind, key);
                    queue.add(&key);
                }
                None => {
                    debug!("[Router] notification channel closed.");
                    break;
                }
            }
        }
    }
    Ok(())
}
