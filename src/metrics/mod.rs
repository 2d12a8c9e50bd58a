use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::IntGaugeVec;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


lazy_static! {
    pub static ref STORED_RESOURCES: IntGaugeVec = IntGaugeVec::new(
        Opts::new("nsp_stored_resources", "Resources currently held per kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_WATCHERS: IntGaugeVec = IntGaugeVec::new(
        Opts::new("nsp_active_watchers", "Registered watchers per kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref DISPATCHED_NOTIFICATIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("nsp_dispatched_notifications", "Views delivered to watcher slots per kind"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref ACTIVE_LEASES: IntGauge =
        IntGauge::new("nsp_active_leases", "Targets with a live keepalive lease")
            .expect("metric can not be created");

    pub static ref LEASE_EVICTIONS: IntCounter =
        IntCounter::new("nsp_lease_evictions", "Targets removed after their lease expired")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

fn register_custom_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(STORED_RESOURCES.clone()),
        Box::new(ACTIVE_WATCHERS.clone()),
        Box::new(DISPATCHED_NOTIFICATIONS.clone()),
        Box::new(ACTIVE_LEASES.clone()),
        Box::new(LEASE_EVICTIONS.clone()),
    ];
    for collector in collectors {
        if let Err(e) = REGISTRY.register(collector) {
            error!("collector can not be registered: {}", e);
        }
    }
}

pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!(port, "Serving prometheus metrics");
    let (_, server) = warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_text())
}

/// Text exposition of every registered collector.
pub fn gather_text() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
