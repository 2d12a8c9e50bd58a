//! Assembles an [`NspNode`] from configuration.
//!
//! The builder opens the configured target backend, wraps it in the
//! keepalive lease manager, composes the handler chain and loads the
//! topology document if one is configured.
//!
//! ## Example
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(());
//! let node = NspNodeBuilder::new(None, shutdown_rx)?.build()?;
//! node.start_metrics_server(shutdown_tx.subscribe());
//! node.run().await?;
//! ```

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use super::NspNode;
use crate::chain::build_chain;
use crate::chain::RegistryLink;
use crate::chain::WatchResponderLink;
use crate::keepalive::KeepAliveRegistry;
use crate::proto::Target;
use crate::storage::MemoryStore;
use crate::storage::ResourceStore;
use crate::storage::SledTargetStore;
use crate::topology::TopologyRegistry;
use crate::Backend;
use crate::NspConfig;
use crate::Result;

pub struct NspNodeBuilder {
    pub(super) config: NspConfig,
    pub(super) target_store: Option<Arc<dyn ResourceStore<Target>>>,
    pub(super) topology: Option<Arc<TopologyRegistry>>,
    pub(super) shutdown_signal: watch::Receiver<()>,
}

impl NspNodeBuilder {
    /// Loads and validates configuration, optionally layering `config_path`
    /// over `CONFIG_PATH` and the environment.
    pub fn new(
        config_path: Option<&str>,
        shutdown_signal: watch::Receiver<()>,
    ) -> Result<Self> {
        let mut config = NspConfig::new()?;
        if let Some(p) = config_path {
            info!("with_override_config from: {}", p);
            config = config.with_override_config(p)?;
        }
        Ok(Self::from_config(config.validate()?, shutdown_signal))
    }

    pub fn from_config(
        config: NspConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        Self {
            config,
            target_store: None,
            topology: None,
            shutdown_signal,
        }
    }

    /// Replaces the configured backend with `store`.
    pub fn target_store(
        mut self,
        store: Arc<dyn ResourceStore<Target>>,
    ) -> Self {
        self.target_store = Some(store);
        self
    }

    /// Shares an existing topology registry instead of creating one.
    pub fn topology(
        mut self,
        topology: Arc<TopologyRegistry>,
    ) -> Self {
        self.topology = Some(topology);
        self
    }

    /// Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// Fails when the backend cannot be opened, its leases cannot be
    /// restored, or the configured topology document is unreadable.
    pub fn build(self) -> Result<NspNode> {
        let mut sled_store = None;
        let backend: Arc<dyn ResourceStore<Target>> = match self.target_store {
            Some(store) => store,
            None => match self.config.registry.backend {
                Backend::Memory => Arc::new(MemoryStore::<Target>::new()),
                Backend::Sled => {
                    let store = Arc::new(SledTargetStore::open(&self.config.registry.datasource)?);
                    sled_store = Some(store.clone());
                    store
                }
            },
        };
        info!(backend = %self.config.registry.backend, "Target backend ready");

        let targets = KeepAliveRegistry::new(backend, self.config.keepalive.entry_timeout())?;
        let store: Arc<dyn ResourceStore<Target>> = Arc::new(targets.clone());
        let chain = build_chain(vec![
            Box::new(RegistryLink::new(store.clone())),
            Box::new(WatchResponderLink::new(store)),
        ]);

        let node = NspNode {
            config: self.config,
            targets,
            sled_store,
            topology: self.topology.unwrap_or_default(),
            chain,
            shutdown_signal: self.shutdown_signal,
        };
        node.reload_topology()?;
        Ok(node)
    }
}
