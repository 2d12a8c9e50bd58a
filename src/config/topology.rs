use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TopologyConfig {
    /// TOML topology document loaded at start-up and on SIGHUP
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TopologyConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config(ConfigError::Message(
                    "topology path cannot be empty when set".into(),
                )));
            }
        }
        Ok(())
    }
}
