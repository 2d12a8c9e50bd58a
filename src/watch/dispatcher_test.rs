use super::*;
use crate::proto::Conduit;
use crate::proto::Trench;
use crate::resource::ChangeEvent;
use crate::resource::ResourceKind;
use crate::test_utils::*;

#[test]
fn register_primes_the_slot() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, mut receiver) = delivery_slot();

    let guard = dispatcher.register(None, slot, vec![trench("t1")]);
    assert_eq!(guard.kind(), ResourceKind::Trench);
    assert!(receiver.has_changed().unwrap());
    assert_eq!(*receiver.borrow_and_update(), vec![trench("t1")]);
}

#[test]
fn dispatch_filters_per_watcher() {
    let dispatcher = Dispatcher::<Conduit>::new();
    let (all_slot, all) = delivery_slot();
    let (scoped_slot, scoped) = delivery_slot();
    let _g1 = dispatcher.register(None, all_slot, vec![]);
    let _g2 = dispatcher.register(Some(conduit("", "t2")), scoped_slot, vec![]);

    let snapshot = vec![conduit("c1", "t1"), conduit("c2", "t2")];
    dispatcher.dispatch(ChangeEvent::new(ResourceKind::Conduit), &snapshot);

    assert_eq!(all.borrow().len(), 2);
    assert_eq!(*scoped.borrow(), vec![conduit("c2", "t2")]);
}

#[test]
fn dispatch_ignores_events_of_other_kinds() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, mut receiver) = delivery_slot();
    let _guard = dispatcher.register(None, slot, vec![]);
    receiver.borrow_and_update();

    dispatcher.dispatch(ChangeEvent::new(ResourceKind::Conduit), &[trench("t1")]);
    assert!(!receiver.has_changed().unwrap());
}

#[test]
fn pending_value_is_replaced_not_queued() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, mut receiver) = delivery_slot();
    let _guard = dispatcher.register(None, slot, vec![]);

    let event = ChangeEvent::new(ResourceKind::Trench);
    dispatcher.dispatch(event, &[trench("t1")]);
    dispatcher.dispatch(event, &[trench("t1"), trench("t2")]);

    assert_eq!(receiver.borrow_and_update().len(), 2);
    assert!(!receiver.has_changed().unwrap());
}

#[test]
fn dropping_guard_unregisters_synchronously() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, _receiver) = delivery_slot();
    let guard = dispatcher.register(None, slot, vec![]);
    assert_eq!(dispatcher.len(), 1);

    drop(guard);
    assert!(dispatcher.is_empty());
}

#[test]
fn guard_outliving_dispatcher_drops_cleanly() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, mut receiver) = delivery_slot();
    let guard = dispatcher.register(None, slot, vec![]);
    receiver.borrow_and_update();

    drop(dispatcher);
    assert!(receiver.has_changed().is_err());
    drop(guard);
}

#[test]
fn watcher_ids_are_unique() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (s1, _r1) = delivery_slot();
    let (s2, _r2) = delivery_slot();
    let g1 = dispatcher.register(None, s1, vec![]);
    let g2 = dispatcher.register(None, s2, vec![]);
    assert_ne!(g1.id(), g2.id());
}

#[tokio::test]
async fn registry_watcher_next_ends_after_stop() {
    let dispatcher = Dispatcher::<Trench>::new();
    let (slot, receiver) = delivery_slot();
    let guard = dispatcher.register(None, slot, vec![trench("t1")]);
    let mut watcher = RegistryWatcher::new(receiver, guard);

    assert_eq!(watcher.next().await, Some(vec![trench("t1")]));
    watcher.stop();
    watcher.stop();
    assert_eq!(watcher.next().await, None);
    assert!(dispatcher.is_empty());
}
