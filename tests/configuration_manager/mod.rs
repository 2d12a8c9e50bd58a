use std::io::Write;

use nsp_registry::proto::Conduit;
use nsp_registry::proto::Flow;
use nsp_registry::proto::Gateway;
use nsp_registry::proto::Stream;
use nsp_registry::proto::Trench;
use tokio_stream::StreamExt;

use crate::common::memory_config;
use crate::common::TestServer;
use crate::common::WAIT;

const TOPOLOGY: &str = r#"
trench = { name = "trench-a" }

[[conduits]]
name = "load-balancer"
trench = "trench-a"

[[streams]]
name = "stream-a"
conduit = "load-balancer"

[[flows]]
name = "flow-a"
protocols = ["tcp"]
destination-port-ranges = ["80"]
priority = 1
stream = "stream-a"

[[gateways]]
name = "gateway1"
address = "169.254.100.150"
remote-asn = 4248829953
local-asn = 8103
hold-time = 24
trench = "trench-a"
"#;

async fn server_with_topology(file: &tempfile::NamedTempFile) -> TestServer {
    let mut config = memory_config(60_000);
    config.topology.path = Some(file.path().to_path_buf());
    TestServer::start(config).await
}

fn topology_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn watch_trench_and_gateway() {
    let file = topology_file(TOPOLOGY);
    let server = server_with_topology(&file).await;
    let mut client = server.configuration_client().await;

    let mut trenches = client.watch_trench(Trench::default()).await.unwrap().into_inner();
    let trench = tokio::time::timeout(WAIT, trenches.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(trench.trench.map(|t| t.name), Some("trench-a".to_string()));

    let mut gateways = client.watch_gateway(Gateway::default()).await.unwrap().into_inner();
    let gateway = tokio::time::timeout(WAIT, gateways.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(gateway.gateways.len(), 1);
    assert_eq!(gateway.gateways[0].remote_asn, 4248829953);

    drop(trenches);
    drop(gateways);
    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn watch_flow_sees_reloaded_topology() {
    let file = topology_file(TOPOLOGY);
    let server = server_with_topology(&file).await;
    let mut client = server.configuration_client().await;

    let filter = Flow {
        stream: Some(Stream {
            name: "stream-a".into(),
            conduit: Some(Conduit {
                name: "load-balancer".into(),
                trench: Some(Trench {
                    name: "trench-a".into(),
                }),
            }),
        }),
        ..Default::default()
    };
    let mut flows = client.watch_flow(filter).await.unwrap().into_inner();
    let primed = tokio::time::timeout(WAIT, flows.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(primed.flows.len(), 1);
    assert_eq!(primed.flows[0].priority, 1);

    std::fs::write(file.path(), TOPOLOGY.replace("priority = 1", "priority = 20")).unwrap();
    server.node.reload_topology().unwrap();

    let update = tokio::time::timeout(WAIT, flows.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(update.flows.len(), 1);
    assert_eq!(update.flows[0].priority, 20);

    drop(flows);
    server.stop().await;
}

#[tokio::test]
async fn watch_conduit_scoped_to_other_trench_is_empty() {
    let file = topology_file(TOPOLOGY);
    let server = server_with_topology(&file).await;
    let mut client = server.configuration_client().await;

    let filter = Conduit {
        name: String::new(),
        trench: Some(Trench {
            name: "trench-b".into(),
        }),
    };
    let mut conduits = client.watch_conduit(filter).await.unwrap().into_inner();
    let primed = tokio::time::timeout(WAIT, conduits.next()).await.unwrap().unwrap().unwrap();
    assert!(primed.conduits.is_empty());

    drop(conduits);
    server.stop().await;
}
