//! Local, eventually-consistent mirror of a remote collection.
//!
//! ## Components
//! - [`StateCache`]: the shared map of last-observed objects
//! - [`key`]: identity derivation for live objects and tombstones
//! - [`Informer`]: list + watch ingestion task that mutates the cache and
//!   emits a [`Notification`] per accepted delta
//!
//! All mutations happen on the informer task; workers only read.

mod informer;
pub mod key;
mod store;

pub use informer::*;
pub use key::*;
pub use store::*;

#[cfg(test)]
mod key_test;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Updated,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            EventKind::Added => write!(f, "Add"),
            EventKind::Updated => write!(f, "Update"),
            EventKind::Deleted => write!(f, "Delete"),
        }
    }
}

/// Accepted cache delta, handed from the informer to the enqueue step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: EventKind,
    pub key: String,
}

impl Notification {
    pub fn new(
        kind: EventKind,
        key: impl Into<String>,
    ) -> Self {
        Self { kind, key: key.into() }
    }
}
