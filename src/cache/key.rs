//! Identity derivation.
//!
//! Identity is `namespace/name`, or just `name` for cluster-scoped objects.
//! It is computed from metadata only, so it stays stable across updates and
//! can still be recovered from a tombstone after the object is gone.

use crate::constants::KEY_SEPARATOR;
use crate::source::DeletedObject;
use crate::IdentityError;
use crate::Resource;

/// Identity of a live object.
pub fn object_key<K: Resource>(obj: &K) -> Result<String, IdentityError> {
    let namespace = obj.namespace().filter(|ns| !ns.is_empty());
    let name = match obj.name() {
        Some(name) if !name.is_empty() => name,
        _ => {
            return Err(IdentityError::MissingName {
                namespace: namespace.map(str::to_string),
            })
        }
    };

    Ok(match namespace {
        Some(ns) => format!("{}{}{}", ns, KEY_SEPARATOR, name),
        None => name.to_string(),
    })
}

/// Identity of a deletion payload.
///
/// A tombstone resolves through its recorded key first, then through the
/// last-known object. Without either there is nothing stable to retry
/// against and the caller is expected to drop the event.
pub fn deletion_key<K: Resource>(deleted: &DeletedObject<K>) -> Result<String, IdentityError> {
    match deleted {
        DeletedObject::Live(obj) => object_key(obj),
        DeletedObject::Tombstone(tombstone) => {
            if let Some(key) = tombstone.key.as_ref().filter(|k| !k.is_empty()) {
                return Ok(key.clone());
            }
            match &tombstone.last_known {
                Some(obj) => object_key(obj).map_err(|_| IdentityError::Unresolvable),
                None => Err(IdentityError::Unresolvable),
            }
        }
    }
}

/// Splits an identity back into `(namespace, name)`.
pub fn split_key(key: &str) -> Result<(Option<&str>, &str), IdentityError> {
    let mut parts = key.split(KEY_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok((None, name)),
        (Some(ns), Some(name), None) if !ns.is_empty() && !name.is_empty() => Ok((Some(ns), name)),
        _ => Err(IdentityError::MalformedKey(key.to_string())),
    }
}
