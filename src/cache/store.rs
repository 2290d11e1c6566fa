use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::deletion_key;
use super::object_key;
use super::EventKind;
use super::Notification;
use crate::resource::is_stale_version;
use crate::source::DeletedObject;
use crate::IdentityError;
use crate::Resource;

/// Shared map of identity -> last observed object.
///
/// Cloning the handle shares the underlying map. Every mutation takes the
/// write lock for its whole duration, so readers see either the state before
/// or after a delta (or a whole `replace`), never something in between.
pub struct StateCache<K> {
    items: Arc<RwLock<HashMap<String, K>>>,
}

impl<K> Clone for StateCache<K> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<K: Resource> Default for StateCache<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Resource> StateCache<K> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<K> {
        self.items.read().get(key).cloned()
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.items.read().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Applies an add or update event.
    ///
    /// Returns `Ok(None)` when the incoming version token is older than the
    /// cached one; the cache never regresses outside of `replace`.
    pub fn apply_upsert(
        &self,
        obj: K,
    ) -> Result<Option<Notification>, IdentityError> {
        let key = object_key(&obj)?;
        let mut items = self.items.write();

        let kind = match items.get(&key) {
            Some(current) => {
                if is_stale_version(current.resource_version(), obj.resource_version()) {
                    debug!(
                        %key,
                        cached = ?current.resource_version(),
                        incoming = ?obj.resource_version(),
                        "ignoring stale update"
                    );
                    return Ok(None);
                }
                EventKind::Updated
            }
            None => EventKind::Added,
        };

        trace!(%key, ?kind, version = ?obj.resource_version(), "cache upsert");
        items.insert(key.clone(), obj);
        Ok(Some(Notification::new(kind, key)))
    }

    /// Applies a delete event.
    ///
    /// Deleting an identity that was never observed locally yields no
    /// notification: there is no prior state for a handler to undo.
    pub fn apply_delete(
        &self,
        deleted: &DeletedObject<K>,
    ) -> Result<Option<Notification>, IdentityError> {
        let key = deletion_key(deleted)?;

        match self.items.write().remove(&key) {
            Some(_) => {
                trace!(%key, "cache delete");
                Ok(Some(Notification::new(EventKind::Deleted, key)))
            }
            None => {
                debug!(%key, "delete for unknown object, nothing to do");
                Ok(None)
            }
        }
    }

    /// Replaces the whole content with a fresh listing.
    ///
    /// Every listed object is reported as Added or Updated, and every local
    /// object missing from the listing as Deleted. Version tokens are not
    /// compared: the listing is authoritative.
    pub fn replace(
        &self,
        listed: Vec<K>,
    ) -> Vec<Notification> {
        let mut fresh: HashMap<String, K> = HashMap::with_capacity(listed.len());
        for obj in listed {
            match object_key(&obj) {
                Ok(key) => {
                    fresh.insert(key, obj);
                }
                Err(e) => warn!(error = %e, "skipping listed object without identity"),
            }
        }

        let mut items = self.items.write();
        let mut notifications = Vec::with_capacity(fresh.len());

        for key in items.keys() {
            if !fresh.contains_key(key) {
                notifications.push(Notification::new(EventKind::Deleted, key.clone()));
            }
        }
        for key in fresh.keys() {
            let kind = if items.contains_key(key) {
                EventKind::Updated
            } else {
                EventKind::Added
            };
            notifications.push(Notification::new(kind, key.clone()));
        }

        debug!(
            total = fresh.len(),
            deleted = notifications.iter().filter(|n| n.kind == EventKind::Deleted).count(),
            "cache replaced"
        );
        *items = fresh;
        notifications
    }
}
