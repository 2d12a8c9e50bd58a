use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::proto::target::Status;
use crate::proto::target::Type;
use crate::proto::Target;
use crate::storage::MemoryStore;
use crate::storage::ResourceStore;
use crate::test_utils::*;

const WAIT: Duration = Duration::from_secs(1);

#[tokio::test]
async fn streams_primed_view_then_updates() {
    let store = Arc::new(MemoryStore::<Target>::new());
    let existing = target(&["10.0.0.1"], Status::Enabled, Type::Default, None);
    store.set(existing.clone()).unwrap();

    let chain = build_chain(vec![Box::new(WatchResponderLink::new(store.clone()))]);
    let (sink, mut responses) = mpsc::channel(4);
    let watch = tokio::spawn(async move { chain.watch(None, sink).await });

    let primed = tokio::time::timeout(WAIT, responses.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(primed.targets, vec![existing]);

    store
        .set(target(&["10.0.0.2"], Status::Disabled, Type::Default, None))
        .unwrap();
    let update = tokio::time::timeout(WAIT, responses.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(update.targets.len(), 2);

    drop(responses);
    tokio::time::timeout(WAIT, watch).await.unwrap().unwrap().unwrap();
    assert_eq!(store.watcher_count(), 0);
}

#[tokio::test]
async fn filter_scopes_streamed_view() {
    let store = Arc::new(MemoryStore::<Target>::new());
    store
        .set(target(&["10.0.0.1"], Status::Enabled, Type::Default, None))
        .unwrap();
    store
        .set(target(&["10.0.0.2"], Status::Disabled, Type::Frontend, None))
        .unwrap();

    let link = WatchResponderLink::new(store.clone());
    let (sink, mut responses) = mpsc::channel(4);
    let watch = tokio::spawn(async move { link.watch(Some(any_status(Type::Frontend)), sink).await });

    let primed = tokio::time::timeout(WAIT, responses.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(primed.targets.len(), 1);
    assert_eq!(primed.targets[0].ips, vec!["10.0.0.2"]);

    drop(responses);
    tokio::time::timeout(WAIT, watch).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn watch_is_forwarded_before_streaming() {
    let store = Arc::new(MemoryStore::<Target>::new());
    let mut next = MockTargetRegistryLink::new();
    next.expect_set_next().return_const(());
    next.expect_watch().times(1).returning(|_, _| Ok(()));

    let chain = build_chain(vec![Box::new(WatchResponderLink::new(store)), Box::new(next)]);
    let (sink, responses) = mpsc::channel(1);
    drop(responses);

    tokio::time::timeout(WAIT, chain.watch(None, sink)).await.unwrap().unwrap();
}

#[tokio::test]
async fn mutations_pass_through() {
    let store = Arc::new(MemoryStore::<Target>::new());
    let mut next = MockTargetRegistryLink::new();
    next.expect_set_next().return_const(());
    next.expect_register().times(1).returning(|_| Ok(()));

    let chain = build_chain(vec![Box::new(WatchResponderLink::new(store.clone())), Box::new(next)]);
    chain
        .register(target(&["10.0.0.1"], Status::Enabled, Type::Default, None))
        .await
        .unwrap();
    assert!(store.is_empty());
}
