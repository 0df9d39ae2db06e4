use std::sync::Arc;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Route {
    Raw,
    Explore,
    Init,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    pub route: Route,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Central container for every Prometheus metric exposed by the gateway.
pub struct Metrics {
    pub requests_total: Family<RouteLabels, Counter>,
    pub appliance_round_trip_seconds: Family<RouteLabels, Histogram>,
    pub appliance_unavailable_total: Counter,
    pub appliance_rejections_total: Counter,
    pub decrypt_failures_total: Counter,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let requests_total = Family::<RouteLabels, Counter>::default();
        registry.register(
            "mielegw_requests_total",
            "Forwarded requests by gateway route",
            requests_total.clone(),
        );

        let appliance_round_trip_seconds =
            Family::<RouteLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.01, 2.0, 12))
            });
        registry.register(
            "mielegw_appliance_round_trip_seconds",
            "Outbound appliance round-trip latency in seconds",
            appliance_round_trip_seconds.clone(),
        );

        let appliance_unavailable_total = Counter::default();
        registry.register(
            "mielegw_appliance_unavailable_total",
            "Outbound calls that failed with connection refused or timeout",
            appliance_unavailable_total.clone(),
        );

        let appliance_rejections_total = Counter::default();
        registry.register(
            "mielegw_appliance_rejections_total",
            "Outbound calls the appliance answered with an HTTP error",
            appliance_rejections_total.clone(),
        );

        let decrypt_failures_total = Counter::default();
        registry.register(
            "mielegw_decrypt_failures_total",
            "Appliance responses that could not be decrypted",
            decrypt_failures_total.clone(),
        );

        Self {
            requests_total,
            appliance_round_trip_seconds,
            appliance_unavailable_total,
            appliance_rejections_total,
            decrypt_failures_total,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in `AppState`.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all gateway metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
