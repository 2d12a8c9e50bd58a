use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::*;
use crate::proto::target::Status;
use crate::proto::target::Type;
use crate::proto::Target;
use crate::storage::MemoryStore;
use crate::storage::ResourceStore;
use crate::test_utils::*;
use crate::topology::TopologyRegistry;
use crate::Backend;
use crate::NspConfig;

const TOPOLOGY: &str = r#"
trench = { name = "t1" }

[[conduits]]
name = "c1"
trench = "t1"
"#;

fn memory_config() -> NspConfig {
    let mut config = NspConfig::default();
    config.registry.backend = Backend::Memory;
    config
}

#[tokio::test]
async fn memory_backend_builds_empty_node() {
    let (_tx, rx) = watch::channel(());
    let node = NspNodeBuilder::from_config(memory_config(), rx).build().unwrap();

    assert!(node.targets().get(None).unwrap().is_empty());
    assert_eq!(node.targets().timeout(), Duration::from_secs(60));
    assert!(node.topology().trenches().is_empty());
}

#[tokio::test]
async fn configured_topology_is_loaded_at_build() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topology.toml");
    std::fs::write(&path, TOPOLOGY).unwrap();

    let mut config = memory_config();
    config.topology.path = Some(path);
    let (_tx, rx) = watch::channel(());
    let node = NspNodeBuilder::from_config(config, rx).build().unwrap();

    assert_eq!(node.topology().trenches().get(None).unwrap(), vec![trench("t1")]);
    assert_eq!(node.topology().conduits().get(None).unwrap(), vec![conduit("c1", "t1")]);
}

#[tokio::test]
async fn missing_topology_file_fails_build() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = memory_config();
    config.topology.path = Some(dir.path().join("absent.toml"));
    let (_tx, rx) = watch::channel(());

    assert!(NspNodeBuilder::from_config(config, rx).build().is_err());
}

#[tokio::test]
async fn injected_store_gets_leases_restored() {
    let store = Arc::new(MemoryStore::<Target>::new());
    store
        .set(target(&["10.0.0.1"], Status::Enabled, Type::Default, None))
        .unwrap();

    let (_tx, rx) = watch::channel(());
    let node = NspNodeBuilder::from_config(memory_config(), rx)
        .target_store(store)
        .build()
        .unwrap();
    assert_eq!(node.targets().lease_count(), 1);
}

#[tokio::test]
async fn shared_topology_is_used() {
    let topology = Arc::new(TopologyRegistry::new());
    let (_tx, rx) = watch::channel(());
    let node = NspNodeBuilder::from_config(memory_config(), rx)
        .topology(topology.clone())
        .build()
        .unwrap();
    assert!(Arc::ptr_eq(node.topology(), &topology));
}

#[tokio::test]
async fn sled_backend_persists_across_builds() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NspConfig::default();
    config.registry.datasource = dir.path().join("registry");
    let registered = target(&["10.0.0.1"], Status::Disabled, Type::Default, Some(stream("s1", "c1", "t1")));

    {
        let (_tx, rx) = watch::channel(());
        let node = NspNodeBuilder::from_config(config.clone(), rx).build().unwrap();
        node.targets().set(registered.clone()).unwrap();
        node.sled_store.as_ref().unwrap().flush().unwrap();
    }

    let (_tx, rx) = watch::channel(());
    let node = NspNodeBuilder::from_config(config, rx).build().unwrap();
    assert_eq!(node.targets().get(None).unwrap(), vec![registered]);
    assert_eq!(node.targets().lease_count(), 1);
}
