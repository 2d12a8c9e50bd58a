use std::sync::Arc;

use nsp_registry::Error;
use nsp_registry::NetworkError;
use nsp_registry::NspConfig;
use nsp_registry::NspNode;
use nsp_registry::NspNodeBuilder;
use nsp_registry::Result;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = NspConfig::new()?.validate()?;

    // Initializing Logs
    let _guard = init_observability(&config)?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let node = Arc::new(NspNodeBuilder::from_config(config, graceful_rx.clone()).build()?);
    node.start_metrics_server(graceful_rx.clone());

    tokio::spawn(reload_on_hangup(node.clone(), graceful_rx));

    info!("Application started. Waiting for CTRL+C signal...");
    tokio::spawn(async {
        if let Err(e) = graceful_shutdown(graceful_tx).await {
            error!("Failed to shutdown: {:?}", e);
        }
    });

    if let Err(e) = node.run().await {
        error!("node stops: {:?}", e);
        return Err(e);
    }

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(e.to_string()))?;
    let mut sigterm = signal(SignalKind::terminate()).map_err(|e| Error::Fatal(e.to_string()))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        NetworkError::SignalSendFailed(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

/// Reloads the topology document on every SIGHUP until shutdown.
async fn reload_on_hangup(
    node: Arc<NspNode>,
    mut shutdown_signal: watch::Receiver<()>,
) {
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("SIGHUP handler unavailable, topology reload disabled: {}", e);
            return;
        }
    };
    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("SIGHUP detected, reloading topology.");
                if let Err(e) = node.reload_topology() {
                    error!("Topology reload failed, keeping previous topology: {:?}", e);
                }
            },
            _ = shutdown_signal.changed() => return,
        }
    }
}

fn init_observability(config: &NspConfig) -> Result<Option<WorkerGuard>> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let stdout = tracing_subscriber::fmt::layer().with_filter(filter());

    let (file, guard) = match &config.server.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| Error::Fatal(format!("log_dir {}: {}", dir.display(), e)))?;
            let appender = tracing_appender::rolling::daily(dir, "nsp.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stdout).with(file).init();
    Ok(guard)
}
