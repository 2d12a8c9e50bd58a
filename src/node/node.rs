//! A running registry process: target registry, topology and the servers
//! exposing them.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;
use tracing::info;

use crate::chain::TargetRegistryLink;
use crate::grpc;
use crate::grpc::ConfigurationManagerService;
use crate::grpc::TargetRegistryService;
use crate::keepalive::KeepAliveRegistry;
use crate::metrics;
use crate::storage::SledTargetStore;
use crate::topology::TopologyDocument;
use crate::topology::TopologyRegistry;
use crate::watch::WatcherNotifier;
use crate::NetworkError;
use crate::NspConfig;
use crate::Result;

pub struct NspNode {
    pub(super) config: NspConfig,
    pub(super) targets: KeepAliveRegistry,
    pub(super) sled_store: Option<Arc<SledTargetStore>>,
    pub(super) topology: Arc<TopologyRegistry>,
    pub(super) chain: Arc<dyn TargetRegistryLink>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl NspNode {
    pub fn config(&self) -> &NspConfig {
        &self.config
    }

    /// Target store with keepalive leases applied.
    pub fn targets(&self) -> &KeepAliveRegistry {
        &self.targets
    }

    pub fn topology(&self) -> &Arc<TopologyRegistry> {
        &self.topology
    }

    /// Re-reads the configured topology document and applies it. A node
    /// without a topology path keeps its current topology.
    pub fn reload_topology(&self) -> Result<()> {
        let Some(path) = &self.config.topology.path else {
            return Ok(());
        };
        info!(path = %path.display(), "Loading topology");
        let snapshot = TopologyDocument::load(path)?.convert();
        self.topology.apply(snapshot)
    }

    pub fn target_registry_service(&self) -> TargetRegistryService {
        TargetRegistryService::new(self.chain.clone(), self.config.watch.stream_buffer)
    }

    pub fn configuration_manager_service(&self) -> ConfigurationManagerService {
        ConfigurationManagerService::new(
            WatcherNotifier::new(self.topology.clone()),
            self.config.watch.stream_buffer,
        )
    }

    /// Spawns the prometheus endpoint when monitoring is enabled.
    pub fn start_metrics_server(
        &self,
        shutdown_signal: watch::Receiver<()>,
    ) {
        if !self.config.monitoring.prometheus_enabled {
            return;
        }
        let port = self.config.monitoring.prometheus_port;
        tokio::spawn(async move {
            metrics::start_server(port, shutdown_signal).await;
        });
    }

    /// Serves both gRPC services on `listener` until shutdown, then flushes
    /// the persistent backend.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<()> {
        let result = grpc::start_rpc_server(
            self.target_registry_service(),
            self.configuration_manager_service(),
            listener,
            self.config.server.clone(),
            self.shutdown_signal.clone(),
        )
        .await;

        if let Some(store) = &self.sled_store {
            if let Err(e) = store.flush() {
                error!("Failed to flush target store: {:?}", e);
            }
        }
        result
    }

    /// Binds the configured listen address and serves on it.
    pub async fn run(&self) -> Result<()> {
        let address = self.config.server.listen_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| NetworkError::Bind {
                address: address.to_string(),
                source,
            })?;
        self.serve(listener).await
    }
}
