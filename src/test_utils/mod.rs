//! the test_utils folder here will share fakes and fixtures between the
//! unit tests of every component
mod fake_collection;
mod recording_handler;
mod test_object;

pub use fake_collection::*;
pub use recording_handler::*;
pub use test_object::*;

use std::time::Duration;

use tokio::sync::mpsc;

use crate::Notification;

/// Receives the next notification or panics after `wait`.
pub(crate) async fn recv_notification(
    rx: &mut mpsc::Receiver<Notification>,
    wait: Duration,
) -> Notification {
    tokio::time::timeout(wait, rx.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification channel closed")
}

/// Drains everything currently buffered without waiting.
pub(crate) fn drain_notifications(rx: &mut mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}
