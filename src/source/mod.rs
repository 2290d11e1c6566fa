//! Remote collection seam.
//!
//! The informer only needs two operations from the remote side: a full
//! enumeration and an incremental change stream resuming from the version the
//! enumeration returned. The stream may end at any time; callers relist.

mod kube_pods;
pub use kube_pods::*;

use futures::stream::BoxStream;
#[cfg(test)]
use mockall::automock;

use crate::Resource;
use crate::Result;

/// Change stream handed out by [`RemoteCollection::watch`].
pub type WatchStream<K> = BoxStream<'static, Result<WatchEvent<K>>>;

/// Result of a full enumeration.
#[derive(Debug, Clone)]
pub struct ObjectList<K> {
    pub items: Vec<K>,
    /// Version to resume the change stream from
    pub resource_version: Option<String>,
}

impl<K> ObjectList<K> {
    pub fn new(
        items: Vec<K>,
        resource_version: Option<String>,
    ) -> Self {
        Self {
            items,
            resource_version,
        }
    }
}

/// Last-known-state marker for a deleted object whose live state is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct Tombstone<K> {
    /// Identity recorded when the deletion was detected, if any
    pub key: Option<String>,
    pub last_known: Option<K>,
}

impl<K> Tombstone<K> {
    pub fn new(
        key: Option<String>,
        last_known: Option<K>,
    ) -> Self {
        Self { key, last_known }
    }

    /// A tombstone with nothing to derive an identity from.
    pub fn empty() -> Self {
        Self {
            key: None,
            last_known: None,
        }
    }
}

/// Payload of a deletion: the final object, or only what was left of it.
#[derive(Debug, Clone, PartialEq)]
pub enum DeletedObject<K> {
    Live(K),
    Tombstone(Tombstone<K>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<K> {
    Added(K),
    Modified(K),
    Deleted(DeletedObject<K>),
    /// Progress marker; carries only the version to resume from
    Bookmark(String),
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RemoteCollection<K>: Send + Sync + 'static
where
    K: Resource,
{
    /// Scope name used for logging, e.g. the namespace
    fn scope(&self) -> String;

    async fn list(&self) -> Result<ObjectList<K>>;

    async fn watch(
        &self,
        resource_version: Option<String>,
    ) -> Result<WatchStream<K>>;
}
