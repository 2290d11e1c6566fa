use super::*;
use crate::source::DeletedObject;
use crate::source::Tombstone;
use crate::test_utils::TestObject;
use crate::IdentityError;

#[test]
fn test_object_key_namespaced() {
    let obj = TestObject::new("idc-demo-dev", "pod1", 1);
    assert_eq!(object_key(&obj).unwrap(), "idc-demo-dev/pod1");
}

#[test]
fn test_object_key_cluster_scoped() {
    let obj = TestObject::cluster_scoped("node-a", 1);
    assert_eq!(object_key(&obj).unwrap(), "node-a");

    let mut obj = TestObject::new("", "node-b", 1);
    obj.namespace = Some(String::new());
    assert_eq!(object_key(&obj).unwrap(), "node-b");
}

#[test]
fn test_object_key_is_stable_across_versions() {
    let v1 = TestObject::new("ns", "pod1", 1);
    let v2 = TestObject::new("ns", "pod1", 2);
    assert_eq!(object_key(&v1).unwrap(), object_key(&v2).unwrap());
}

#[test]
fn test_object_key_missing_name() {
    let mut obj = TestObject::new("ns", "pod1", 1);
    obj.name = None;
    assert_eq!(
        object_key(&obj),
        Err(IdentityError::MissingName {
            namespace: Some("ns".to_string())
        })
    );
}

#[test]
fn test_deletion_key_live_object() {
    let deleted = DeletedObject::Live(TestObject::new("ns", "pod1", 3));
    assert_eq!(deletion_key(&deleted).unwrap(), "ns/pod1");
}

#[test]
fn test_deletion_key_prefers_recorded_tombstone_key() {
    let deleted = DeletedObject::Tombstone(Tombstone::new(
        Some("ns/recorded".to_string()),
        Some(TestObject::new("ns", "other", 1)),
    ));
    assert_eq!(deletion_key(&deleted).unwrap(), "ns/recorded");
}

#[test]
fn test_deletion_key_falls_back_to_last_known_state() {
    let deleted = DeletedObject::Tombstone(Tombstone::new(None, Some(TestObject::new("ns", "pod2", 7))));
    assert_eq!(deletion_key(&deleted).unwrap(), "ns/pod2");
}

#[test]
fn test_deletion_key_without_metadata_is_unresolvable() {
    let deleted: DeletedObject<TestObject> = DeletedObject::Tombstone(Tombstone::empty());
    assert_eq!(deletion_key(&deleted), Err(IdentityError::Unresolvable));

    let mut nameless = TestObject::new("ns", "x", 1);
    nameless.name = None;
    let deleted = DeletedObject::Tombstone(Tombstone::new(Some(String::new()), Some(nameless)));
    assert_eq!(deletion_key(&deleted), Err(IdentityError::Unresolvable));
}

#[test]
fn test_split_key() {
    assert_eq!(split_key("ns/pod1").unwrap(), (Some("ns"), "pod1"));
    assert_eq!(split_key("node-a").unwrap(), (None, "node-a"));

    for bad in ["", "/pod", "ns/", "a/b/c"] {
        assert_eq!(split_key(bad), Err(IdentityError::MalformedKey(bad.to_string())));
    }
}
