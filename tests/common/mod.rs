use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nsp_registry::proto::configuration_manager_client::ConfigurationManagerClient;
use nsp_registry::proto::target_registry_client::TargetRegistryClient;
use nsp_registry::Backend;
use nsp_registry::NspConfig;
use nsp_registry::NspNode;
use nsp_registry::NspNodeBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

pub const WAIT: Duration = Duration::from_secs(5);

/// A node serving on an ephemeral loopback port.
pub struct TestServer {
    pub node: Arc<NspNode>,
    pub address: SocketAddr,
    shutdown: watch::Sender<()>,
    handle: JoinHandle<nsp_registry::Result<()>>,
}

impl TestServer {
    pub async fn start(config: NspConfig) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(());
        let node = Arc::new(NspNodeBuilder::from_config(config, shutdown_rx).build().unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let handle = {
            let node = node.clone();
            tokio::spawn(async move { node.serve(listener).await })
        };
        Self {
            node,
            address,
            shutdown,
            handle,
        }
    }

    pub async fn target_client(&self) -> TargetRegistryClient<Channel> {
        TargetRegistryClient::new(self.channel().await)
    }

    pub async fn configuration_client(&self) -> ConfigurationManagerClient<Channel> {
        ConfigurationManagerClient::new(self.channel().await)
    }

    async fn channel(&self) -> Channel {
        let endpoint = format!("http://{}", self.address);
        for _ in 0..100 {
            if let Ok(channel) = Channel::from_shared(endpoint.clone()).unwrap().connect().await {
                return channel;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("server at {} never became reachable", self.address);
    }

    pub async fn stop(self) {
        self.shutdown.send(()).unwrap();
        tokio::time::timeout(WAIT, self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

pub fn memory_config(entry_timeout_ms: u64) -> NspConfig {
    let mut config = NspConfig::default();
    config.registry.backend = Backend::Memory;
    config.keepalive.entry_timeout_ms = entry_timeout_ms;
    config
}

pub fn sled_config(datasource: &Path) -> NspConfig {
    let mut config = NspConfig::default();
    config.registry.datasource = datasource.to_path_buf();
    config
}
