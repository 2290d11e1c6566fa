use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::source::ObjectList;
use crate::source::RemoteCollection;
use crate::source::WatchEvent;
use crate::source::WatchStream;
use crate::Resource;
use crate::Result;
use crate::SourceError;

/// Sender side of a scripted watch session. Dropping it ends the stream.
pub type WatchFeed<K> = mpsc::UnboundedSender<Result<WatchEvent<K>>>;

/// Scripted in-memory remote collection.
///
/// `list()` returns the current snapshot unless a failure was queued with
/// `fail_next_list`. Each `watch()` call consumes the next session opened with
/// `open_watch`; without one, the returned stream stays pending forever.
pub struct FakeCollection<K> {
    scope: String,
    snapshot: Mutex<ObjectList<K>>,
    list_failures: Mutex<VecDeque<String>>,
    sessions: Mutex<VecDeque<mpsc::UnboundedReceiver<Result<WatchEvent<K>>>>>,
    watch_versions: Mutex<Vec<Option<String>>>,
    list_calls: AtomicUsize,
}

impl<K: Resource> FakeCollection<K> {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            snapshot: Mutex::new(ObjectList::new(vec![], Some("0".to_string()))),
            list_failures: Mutex::new(VecDeque::new()),
            sessions: Mutex::new(VecDeque::new()),
            watch_versions: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_list(
        &self,
        items: Vec<K>,
        resource_version: &str,
    ) {
        *self.snapshot.lock() = ObjectList::new(items, Some(resource_version.to_string()));
    }

    pub fn fail_next_list(
        &self,
        reason: &str,
    ) {
        self.list_failures.lock().push_back(reason.to_string());
    }

    pub fn open_watch(&self) -> WatchFeed<K> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().push_back(rx);
        tx
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn watch_versions(&self) -> Vec<Option<String>> {
        self.watch_versions.lock().clone()
    }
}

#[async_trait::async_trait]
impl<K: Resource> RemoteCollection<K> for FakeCollection<K> {
    fn scope(&self) -> String {
        self.scope.clone()
    }

    async fn list(&self) -> Result<ObjectList<K>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.list_failures.lock().pop_front() {
            return Err(SourceError::List(reason).into());
        }
        Ok(self.snapshot.lock().clone())
    }

    async fn watch(
        &self,
        resource_version: Option<String>,
    ) -> Result<WatchStream<K>> {
        self.watch_versions.lock().push(resource_version);
        match self.sessions.lock().pop_front() {
            Some(rx) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}
