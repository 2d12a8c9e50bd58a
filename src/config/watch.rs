use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Responses buffered per watch stream before the sender waits
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.stream_buffer == 0 {
            return Err(Error::Config(ConfigError::Message("stream_buffer must be > 0".into())));
        }
        Ok(())
    }
}

fn default_stream_buffer() -> usize {
    16
}
