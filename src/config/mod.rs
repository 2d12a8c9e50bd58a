//! Hierarchical configuration for the registry process.
//!
//! Sources are merged with increasing priority:
//! 1. Type defaults
//! 2. The TOML file named by `CONFIG_PATH`
//! 3. Environment variables prefixed `NSP__`
//!
//! Loading never validates; call [`NspConfig::validate`] after the last
//! override.

mod keepalive;
mod monitoring;
mod registry;
mod server;
mod topology;
mod watch;
pub use keepalive::*;
pub use monitoring::*;
pub use registry::*;
pub use server::*;
pub use topology::*;
pub use watch::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "NSP";

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct NspConfig {
    /// gRPC listener and logging
    #[serde(default)]
    pub server: ServerConfig,
    /// Target registry backend selection
    #[serde(default)]
    pub registry: RegistryConfig,
    /// Target liveness leases
    #[serde(default)]
    pub keepalive: KeepAliveConfig,
    /// Operator topology document
    #[serde(default)]
    pub topology: TopologyConfig,
    /// Watch stream tuning
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for NspConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("NspConfig")
            .field("listen_address", &self.server.listen_address)
            .field("backend", &self.registry.backend)
            .field("entry_timeout_ms", &self.keepalive.entry_timeout_ms)
            .finish()
    }
}

impl NspConfig {
    /// Loads defaults, then `CONFIG_PATH`, then `NSP__*` variables.
    ///
    /// # Example
    /// ```ignore
    /// std::env::set_var("NSP__KEEPALIVE__ENTRY_TIMEOUT_MS", "30000");
    /// let cfg = NspConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        let config: Self = builder.add_source(environment()).build()?.try_deserialize()?;
        Ok(config)
    }

    /// Layers the file at `path` over the current values. Environment
    /// variables are applied again on top.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the checked configuration.
    pub fn validate(self) -> Result<Self> {
        self.server.validate()?;
        self.registry.validate()?;
        self.keepalive.validate()?;
        self.topology.validate()?;
        self.watch.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
