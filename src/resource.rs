//! Typed view over the metadata of an observed object.
//!
//! Every object flowing through the pipeline is resolved to a concrete type at
//! the source boundary; the cache, queue and controller only rely on this trait.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::Pod;

pub trait Resource: Clone + Debug + Send + Sync + 'static {
    /// Scope of the object. `None` or empty means cluster-scoped.
    fn namespace(&self) -> Option<&str>;

    fn name(&self) -> Option<&str>;

    /// Version token supplied by the remote source.
    fn resource_version(&self) -> Option<&str>;
}

impl Resource for Pod {
    fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }
}

/// Returns true if `incoming` is strictly older than `current`.
///
/// Tokens are only comparable when both parse as integers; an opaque token
/// never counts as stale so the latest delivered state wins.
pub(crate) fn is_stale_version(
    current: Option<&str>,
    incoming: Option<&str>,
) -> bool {
    match (
        current.and_then(|v| v.parse::<u64>().ok()),
        incoming.and_then(|v| v.parse::<u64>().ok()),
    ) {
        (Some(current), Some(incoming)) => incoming < current,
        _ => false,
    }
}
