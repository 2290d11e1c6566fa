//! Policy plugged into the reconciliation loop.
//!
//! Workers call a [`Handler`] with the current state of one identity at a
//! time. Calls for different identities run concurrently on separate workers;
//! calls for the same identity are serialized by the work queue.
//!
//! Any call may be redelivered (failed attempt, process restart), so every
//! implementation must be idempotent.
mod pod_logging_handler;
pub use pod_logging_handler::*;


#[cfg(test)]
use mockall::automock;

use crate::Resource;
use crate::Result;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Handler<K>: Send + Sync + 'static
where
    K: Resource,
{
    /// Called once before any worker starts. An error aborts startup.
    async fn init(&self) -> Result<()>;

    /// First observation of `obj` by this process.
    async fn object_created(
        &self,
        obj: &K,
    ) -> Result<()>;

    /// `old` is the state last delivered for the same identity.
    async fn object_updated(
        &self,
        old: &K,
        new: &K,
    ) -> Result<()>;

    /// The identity is gone from the cache. `last_known` is the state last
    /// delivered to this handler, if any.
    async fn object_deleted(
        &self,
        key: &str,
        last_known: Option<K>,
    ) -> Result<()>;
}
