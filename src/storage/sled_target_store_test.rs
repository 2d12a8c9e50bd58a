use super::*;
use crate::constants::META_KEY_SCHEMA_VERSION;
use crate::constants::META_TREE;
use crate::constants::TARGET_TREE;
use crate::proto::target::Status;
use crate::proto::target::Type;
use crate::proto::Target;
use crate::test_utils::*;
use crate::Error;
use crate::StorageError;
use crate::SystemError;

fn temporary_store() -> SledTargetStore {
    let db = sled::Config::new().temporary(true).open().unwrap();
    SledTargetStore::from_db(db).unwrap()
}

#[test]
fn stored_target_comes_back_with_full_parent_chain() {
    let store = temporary_store();
    let t = target_with_context(
        &["172.16.0.1/24", "fd00::1/64"],
        Status::Enabled,
        Some(stream("stream-a", "conduit-a", "trench-a")),
        &[("identifier", "1")],
    );
    store.set(t.clone()).unwrap();

    let stored = store.get(None).unwrap();
    assert_eq!(stored, vec![t]);
}

#[test]
fn streamless_target_round_trips_without_stream() {
    let store = temporary_store();
    let t = target(&["10.0.0.1"], Status::Disabled, Type::Frontend, None);
    store.set(t.clone()).unwrap();

    assert_eq!(store.get(None).unwrap(), vec![t]);
}

#[test]
fn update_overwrites_status_and_context_only() {
    let store = temporary_store();
    let s = Some(stream("s1", "c1", "t1"));
    store
        .set(target_with_context(&["10.0.0.1"], Status::Disabled, s.clone(), &[("k", "1")]))
        .unwrap();
    store
        .set(target_with_context(&["10.0.0.1"], Status::Enabled, s.clone(), &[("k", "2")]))
        .unwrap();

    let stored = store.get(None).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status(), Status::Enabled);
    assert_eq!(stored[0].context.get("k").map(String::as_str), Some("2"));
}

#[test]
fn get_applies_filter() {
    let store = temporary_store();
    store
        .set(target(&["10.0.0.1"], Status::Enabled, Type::Default, Some(stream("s1", "c1", "t1"))))
        .unwrap();
    store
        .set(target(&["10.0.0.2"], Status::Disabled, Type::Default, Some(stream("s1", "c1", "t1"))))
        .unwrap();
    store
        .set(target(&["10.0.0.3"], Status::Enabled, Type::Frontend, None))
        .unwrap();

    assert_eq!(store.get(Some(any_status(Type::Default))).unwrap().len(), 2);
    assert_eq!(store.get(Some(Target::default())).unwrap().len(), 1);
    assert_eq!(store.get(Some(any_status(Type::Frontend))).unwrap().len(), 1);
}

#[test]
fn remove_is_idempotent() {
    let store = temporary_store();
    let t = target(&["10.0.0.1"], Status::Enabled, Type::Default, None);
    store.set(t.clone()).unwrap();
    let mut watcher = store.watch(None).unwrap();
    watcher.try_next();

    store.remove(&t).unwrap();
    assert_eq!(watcher.try_next(), Some(vec![]));

    store.remove(&t).unwrap();
    assert!(watcher.try_next().is_none());
}

#[test]
fn relinked_stream_clears_conflicting_targets() {
    let store = temporary_store();
    let target0 = target(&["172.16.0.1/24"], Status::Enabled, Type::Default, Some(stream("stream-a", "conduit-a", "trench-a")));
    let target1 = target(&["172.16.0.2/24"], Status::Enabled, Type::Default, Some(stream("stream-a", "conduit-a", "trench-a")));
    let target2 = target(&["172.16.0.3/24"], Status::Enabled, Type::Default, Some(stream("stream-b", "conduit-a", "trench-a")));
    for t in [&target0, &target1, &target2] {
        store.set(t.clone()).unwrap();
    }

    let moved = target(&["172.16.0.1/24"], Status::Enabled, Type::Default, Some(stream("stream-a", "conduit-b", "trench-a")));
    store.set(moved.clone()).unwrap();

    let mut stored = store.get(None).unwrap();
    stored.sort_by_key(|t| t.ips.clone());
    assert_eq!(stored, vec![moved, target2]);
}

#[test]
fn watchers_are_primed_and_notified() {
    let store = temporary_store();
    let mut watcher = store.watch(Some(any_status(Type::Default))).unwrap();
    assert_eq!(watcher.try_next(), Some(vec![]));

    let t = target(&["10.0.0.1"], Status::Disabled, Type::Default, None);
    store.set(t.clone()).unwrap();
    assert_eq!(watcher.try_next(), Some(vec![t]));
}

#[test]
fn targets_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry");
    let t = target(&["10.0.0.1"], Status::Enabled, Type::Default, Some(stream("s1", "c1", "t1")));
    {
        let store = SledTargetStore::open(&path).unwrap();
        store.set(t.clone()).unwrap();
        store.flush().unwrap();
    }

    let reopened = SledTargetStore::open(&path).unwrap();
    assert_eq!(reopened.get(None).unwrap(), vec![t]);
}

#[test]
fn schema_mismatch_fails_construction() {
    let db = sled::Config::new().temporary(true).open().unwrap();
    let meta = db.open_tree(META_TREE).unwrap();
    meta.insert(META_KEY_SCHEMA_VERSION, bincode::serialize(&99u32).unwrap())
        .unwrap();

    let result = SledTargetStore::from_db(db);
    assert!(matches!(
        result,
        Err(Error::System(SystemError::Storage(StorageError::SchemaMismatch { found: 99, .. })))
    ));
}

#[test]
fn undecodable_row_fails_construction() {
    let db = sled::Config::new().temporary(true).open().unwrap();
    db.open_tree(TARGET_TREE)
        .unwrap()
        .insert("broken", vec![0xff, 0x01])
        .unwrap();

    let result = SledTargetStore::from_db(db);
    assert!(matches!(
        result,
        Err(Error::System(SystemError::Storage(StorageError::DataCorruption { .. })))
    ));
}

#[test]
fn target_row_joins_ips_and_serializes_context() {
    let t = target_with_context(&["10.0.0.1", "fd00::1"], Status::Enabled, None, &[("identifier", "7")]);
    let row = target_row(&t).unwrap();
    assert_eq!(row.ips, "10.0.0.1;fd00::1");
    assert_eq!(row.context, r#"{"identifier":"7"}"#);
    assert_eq!(row.id, t.identity());
    assert_eq!(row.stream_name, None);
}
