//! gRPC services and server start-up.
//!
//! [`TargetRegistryService`] fronts the handler chain and
//! [`ConfigurationManagerService`] fronts the topology notifier. Both are
//! served on one listener next to the standard health service.

mod configuration_manager_service;
mod target_registry_service;
pub use configuration_manager_service::*;
pub use target_registry_service::*;


use std::time::Duration;

use futures::FutureExt;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::codec::CompressionEncoding;
use tonic::transport::server::TcpIncoming;
use tonic_health::server::health_reporter;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::proto::configuration_manager_server::ConfigurationManagerServer;
use crate::proto::target_registry_server::TargetRegistryServer;
use crate::NetworkError;
use crate::Result;
use crate::ServerConfig;

/// Serves both registry services on `listener` until `shutdown_signal`
/// fires.
pub async fn start_rpc_server(
    target_registry: TargetRegistryService,
    configuration_manager: ConfigurationManagerService,
    listener: TcpListener,
    config: ServerConfig,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<()> {
    let local_address = listener
        .local_addr()
        .map_err(|source| NetworkError::Bind {
            address: config.listen_address.to_string(),
            source,
        })?;

    let (mut health_reporter, health_service) = health_reporter();
    health_reporter
        .set_serving::<TargetRegistryServer<TargetRegistryService>>()
        .await;
    health_reporter
        .set_serving::<ConfigurationManagerServer<ConfigurationManagerService>>()
        .await;

    let incoming = TcpIncoming::from_listener(
        listener,
        config.tcp_nodelay,
        Some(Duration::from_secs(config.tcp_keepalive_in_secs)),
    )
    .map_err(|e| NetworkError::Bind {
        address: local_address.to_string(),
        source: std::io::Error::other(e),
    })?;

    info!(address = %local_address, "Serving TargetRegistry and ConfigurationManager");

    let served = tonic::transport::Server::builder()
        .concurrency_limit_per_connection(config.concurrency_limit_per_connection)
        .http2_keepalive_interval(Some(Duration::from_secs(config.http2_keep_alive_interval_in_secs)))
        .http2_keepalive_timeout(Some(Duration::from_secs(config.http2_keep_alive_timeout_in_secs)))
        .add_service(health_service)
        .add_service(
            TargetRegistryServer::new(target_registry)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .add_service(
            ConfigurationManagerServer::new(configuration_manager)
                .accept_compressed(CompressionEncoding::Gzip)
                .send_compressed(CompressionEncoding::Gzip),
        )
        .serve_with_incoming_shutdown(
            incoming,
            shutdown_signal.changed().map(move |_| {
                warn!("Stopping RPC server. {}", local_address);
            }),
        )
        .await;

    if let Err(e) = served {
        error!("rpc server on {} failed: {:?}", local_address, e);
        return Err(e.into());
    }
    debug!("rpc service finished!");
    Ok(())
}
