use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::HistogramOpts;
use prometheus::HistogramVec;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref SYNC_CYCLE_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("confsync_sync_cycles", "Long-poll cycles by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    pub static ref NAMESPACE_REFRESH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "confsync_namespace_refreshes",
            "Successful namespace refreshes after a change notification"
        ),
        &["namespace"]
    )
    .expect("metric can not be created");

    pub static ref REFRESH_DURATION_METRIC: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "confsync_refresh_duration_ms",
            "Histogram of namespace refresh duration in ms"
        )
        .buckets(exponential_buckets(1.0, 2.0, 12).unwrap()),
        &["namespace"]
    )
    .expect("metric can not be created");

    pub static ref FALLBACK_LOAD_TOTAL: IntCounter = IntCounter::new(
        "confsync_fallback_loads",
        "Namespaces seeded from the disk fallback store"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER: Once = Once::new();

pub fn register_custom_metrics() {
    REGISTER.call_once(|| {
        REGISTRY
            .register(Box::new(SYNC_CYCLE_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(NAMESPACE_REFRESH_TOTAL.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(REFRESH_DURATION_METRIC.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(FALLBACK_LOAD_TOTAL.clone()))
            .expect("collector can be registered");
    });
}

/// Export metrics in the Prometheus text exposition format.
pub fn gather() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
