use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct KeepAliveConfig {
    /// Time a target survives without a refreshing registration
    #[serde(default = "default_entry_timeout_ms")]
    pub entry_timeout_ms: u64,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            entry_timeout_ms: default_entry_timeout_ms(),
        }
    }
}

impl KeepAliveConfig {
    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.entry_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.entry_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "entry_timeout_ms must be > 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_entry_timeout_ms() -> u64 {
    60_000
}
