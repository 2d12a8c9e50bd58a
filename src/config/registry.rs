use std::fmt;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Where registered targets are kept.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process memory; lost on restart
    Memory,
    /// sled database under `datasource`
    Sled,
}

impl fmt::Display for Backend {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Backend::Memory => f.write_str("memory"),
            Backend::Sled => f.write_str("sled"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Database directory, used by the sled backend only
    #[serde(default = "default_datasource")]
    pub datasource: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            datasource: default_datasource(),
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Sled && self.datasource.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "datasource cannot be empty for the sled backend".into(),
            )));
        }
        Ok(())
    }
}

fn default_backend() -> Backend {
    Backend::Sled
}
fn default_datasource() -> PathBuf {
    PathBuf::from("/run/nsp/data/registry")
}
