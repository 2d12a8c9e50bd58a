use std::net::SocketAddr;
use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// gRPC listener, connection tuning and log output.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address both gRPC services listen on
    #[serde(default = "default_listen_address")]
    pub listen_address: SocketAddr,

    /// Default tracing directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for a daily rolling log file; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit_per_connection: usize,

    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            log_level: default_log_level(),
            log_dir: None,
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            concurrency_limit_per_connection: default_concurrency_limit(),
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(Error::Config(ConfigError::Message(format!(
                "log_level must be one of {:?}, got {}",
                LOG_LEVELS, self.log_level
            ))));
        }

        if self.http2_keep_alive_timeout_in_secs >= self.http2_keep_alive_interval_in_secs {
            return Err(Error::Config(ConfigError::Message(format!(
                "http2_keep_alive_timeout_in_secs ({}) must be less than http2_keep_alive_interval_in_secs ({})",
                self.http2_keep_alive_timeout_in_secs, self.http2_keep_alive_interval_in_secs
            ))));
        }

        if self.concurrency_limit_per_connection == 0 {
            return Err(Error::Config(ConfigError::Message(
                "concurrency_limit_per_connection must be > 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_listen_address() -> SocketAddr {
    SocketAddr::from(([0u16; 8], 7778))
}
fn default_log_level() -> String {
    "debug".to_string()
}
fn default_tcp_keepalive() -> u64 {
    60
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    10
}
fn default_concurrency_limit() -> usize {
    256
}
fn default_tcp_nodelay() -> bool {
    true
}
