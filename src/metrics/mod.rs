use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::SystemError;


lazy_static! {
    pub static ref QUEUE_ADDS: IntCounter =
        IntCounter::new("workqueue_adds_total", "Keys handed to the work queue")
            .expect("metric can not be created");

    pub static ref QUEUE_DEPTH: IntGauge =
        IntGauge::new("workqueue_depth", "Keys waiting in the work queue")
            .expect("metric can not be created");

    pub static ref QUEUE_RETRIES: IntCounter =
        IntCounter::new("workqueue_retries_total", "Rate limited re-adds after failure")
            .expect("metric can not be created");

    pub static ref DROPPED_EVENTS: IntCounter = IntCounter::new(
        "informer_dropped_events_total",
        "Change events dropped because no identity could be derived"
    )
    .expect("metric can not be created");

    pub static ref RELISTS: IntCounter =
        IntCounter::new("informer_relists_total", "Full relists after interruption or resync")
            .expect("metric can not be created");

    pub static ref RECONCILE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("reconcile_total", "Reconcile attempts by outcome and kind"),
        &["outcome", "kind"]
    )
    .expect("metric can not be created");

    pub static ref RECONCILE_LATENCY: Histogram = Histogram::with_opts(
        HistogramOpts::new("reconcile_duration_ms", "Histogram of reconcile duration in ms")
            .buckets(exponential_buckets(1.0, 2.0, 16).expect("valid buckets"))
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

fn register_custom_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(QUEUE_ADDS.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(QUEUE_RETRIES.clone()),
        Box::new(DROPPED_EVENTS.clone()),
        Box::new(RELISTS.clone()),
        Box::new(RECONCILE_TOTAL.clone()),
        Box::new(RECONCILE_LATENCY.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            error!("collector can not be registered: {:?}", e);
        }
    }
}

/// Serves `/metrics` until the shutdown signal fires.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) -> Result<(), SystemError> {
    REGISTER.call_once(|| register_custom_metrics(&REGISTRY));

    let metrics_route = warp::path!("metrics").map(|| REGISTRY.clone()).and_then(metrics_handler);

    let (addr, server) = warp::serve(metrics_route)
        .try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        })
        .map_err(|e| SystemError::MetricsBind {
            port,
            reason: e.to_string(),
        })?;

    info!("metrics endpoint listening on {}", addr);
    server.await;
    Ok(())
}

async fn metrics_handler(registry: Registry) -> Result<impl Reply, Rejection> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    let res = match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    };
    Ok(res)
}

/// Records one finished reconcile.
pub(crate) fn observe_reconcile(
    outcome: &str,
    kind: &str,
    elapsed_ms: f64,
) {
    RECONCILE_TOTAL.with_label_values(&[outcome, kind]).inc();
    RECONCILE_LATENCY.observe(elapsed_ms);
}
