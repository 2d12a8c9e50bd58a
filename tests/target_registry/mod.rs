use std::collections::HashMap;
use std::time::Duration;

use nsp_registry::proto::target::Status;
use nsp_registry::proto::target::Type;
use nsp_registry::proto::Conduit;
use nsp_registry::proto::Stream;
use nsp_registry::proto::Target;
use nsp_registry::proto::Trench;
use nsp_registry::storage::ResourceStore;
use tokio_stream::StreamExt;

use crate::common::memory_config;
use crate::common::sled_config;
use crate::common::TestServer;
use crate::common::WAIT;

fn stream() -> Stream {
    Stream {
        name: "stream-a".into(),
        conduit: Some(Conduit {
            name: "load-balancer".into(),
            trench: Some(Trench {
                name: "trench-a".into(),
            }),
        }),
    }
}

fn target(
    ips: &[&str],
    status: Status,
) -> Target {
    Target {
        ips: ips.iter().map(|ip| ip.to_string()).collect(),
        context: HashMap::from([("identifier".to_string(), "1".to_string())]),
        status: status as i32,
        r#type: Type::Default as i32,
        stream: Some(stream()),
    }
}

fn watch_all() -> Target {
    Target {
        status: Status::Any as i32,
        ..Default::default()
    }
}

#[tokio::test]
async fn first_registration_is_disabled_then_enabled_on_refresh() {
    let server = TestServer::start(memory_config(60_000)).await;
    let mut client = server.target_client().await;
    let mut watch = client.watch(watch_all()).await.unwrap().into_inner();

    let primed = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert!(primed.targets.is_empty());

    client.register(target(&["172.16.0.1/24"], Status::Enabled)).await.unwrap();
    let first = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first.targets.len(), 1);
    assert_eq!(first.targets[0].status(), Status::Disabled);

    client.register(target(&["172.16.0.1/24"], Status::Enabled)).await.unwrap();
    let second = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(second.targets[0].status(), Status::Enabled);

    drop(watch);
    server.stop().await;
}

#[tokio::test]
async fn unregister_is_idempotent() {
    let server = TestServer::start(memory_config(60_000)).await;
    let mut client = server.target_client().await;
    let t = target(&["172.16.0.2/24"], Status::Disabled);

    client.register(t.clone()).await.unwrap();
    client.unregister(t.clone()).await.unwrap();
    client.unregister(t).await.unwrap();

    assert!(server.node.targets().get(None).unwrap().is_empty());
    server.stop().await;
}

#[tokio::test]
async fn unrefreshed_target_is_evicted() {
    let server = TestServer::start(memory_config(200)).await;
    let mut client = server.target_client().await;
    let mut watch = client.watch(watch_all()).await.unwrap().into_inner();
    tokio::time::timeout(WAIT, watch.next()).await.unwrap();

    client.register(target(&["172.16.0.3/24"], Status::Enabled)).await.unwrap();
    let registered = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(registered.targets.len(), 1);

    let evicted = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert!(evicted.targets.is_empty());
    assert_eq!(server.node.targets().lease_count(), 0);

    drop(watch);
    server.stop().await;
}

#[tokio::test]
async fn watch_filter_scopes_by_ips() {
    let server = TestServer::start(memory_config(60_000)).await;
    let mut client = server.target_client().await;
    client.register(target(&["172.16.0.4/24"], Status::Enabled)).await.unwrap();
    client.register(target(&["172.16.0.5/24"], Status::Enabled)).await.unwrap();

    let filter = Target {
        ips: vec!["172.16.0.5/24".into()],
        status: Status::Any as i32,
        ..Default::default()
    };
    let mut watch = client.watch(filter).await.unwrap().into_inner();
    let primed = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(primed.targets.len(), 1);
    assert_eq!(primed.targets[0].ips, vec!["172.16.0.5/24"]);

    drop(watch);
    server.stop().await;
}

#[tokio::test]
async fn sled_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = sled_config(&dir.path().join("registry"));

    let server = TestServer::start(config.clone()).await;
    let mut client = server.target_client().await;
    client.register(target(&["172.16.0.6/24"], Status::Enabled)).await.unwrap();
    drop(client);
    server.stop().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let restarted = TestServer::start(config).await;
    let mut client = restarted.target_client().await;
    let mut watch = client.watch(watch_all()).await.unwrap().into_inner();
    let primed = tokio::time::timeout(WAIT, watch.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(primed.targets.len(), 1);
    assert_eq!(primed.targets[0].stream, Some(stream()));
    assert_eq!(primed.targets[0].context.get("identifier").map(String::as_str), Some("1"));
    assert_eq!(restarted.node.targets().lease_count(), 1);

    drop(watch);
    restarted.stop().await;
}
