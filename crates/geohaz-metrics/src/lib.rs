//! Metrics for geohaz.
//!
//! Every metric is declared once as a [`Metric`] constant in [`metric_defs`], so
//! call sites refer to names that cannot drift from their descriptions. The
//! `metrics` crate is re-exported; without an installed recorder every call is a
//! no-op.
//!
//! ```rust
//! use geohaz_metrics::{metric_defs, OperationLabels};
//!
//! let labels = OperationLabels::new("reduce_image").to_labels();
//! geohaz_metrics::metrics::counter!(metric_defs::OPERATION_CALLS.name, &labels).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A value that can go up and down.
    Gauge,
    /// A distribution of observations.
    Histogram,
}

impl MetricKind {
    /// Lower-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric declaration: name, kind, description, unit and label keys.
///
/// ```rust
/// use geohaz_metrics::{Metric, MetricKind};
/// use geohaz_metrics::metrics::Unit;
///
/// const TILES: Metric = Metric::counter("geohaz.map.tiles")
///     .with_description("Tile sources created")
///     .with_unit(Unit::Count)
///     .with_labels(&["dataset"]);
///
/// assert_eq!(TILES.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// Metric name, e.g. `geohaz.gateway.requests`.
    pub name: &'static str,
    /// Metric kind.
    pub kind: MetricKind,
    /// Human-readable description.
    pub description: &'static str,
    /// Unit of measurement.
    pub unit: Option<Unit>,
    /// Expected label keys.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// A counter with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// A gauge with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// A histogram with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Set the description.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the unit.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Set the expected label keys.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Register the description with the installed recorder.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Remote Compute Gateway
    // ========================================================================

    /// Round trips to the compute service.
    ///
    /// Labels: endpoint (`compute`, `maps`, `assets`)
    pub const GATEWAY_REQUESTS: Metric = Metric::counter("geohaz.gateway.requests")
        .with_description("Requests sent to the remote compute service")
        .with_unit(Unit::Count)
        .with_labels(&["endpoint"]);

    /// Failed round trips.
    ///
    /// Labels: endpoint, status (HTTP status or `timeout`/`transport`)
    pub const GATEWAY_ERRORS: Metric = Metric::counter("geohaz.gateway.errors")
        .with_description("Requests to the remote compute service that failed")
        .with_unit(Unit::Count)
        .with_labels(&["endpoint", "status"]);

    /// Round-trip latency.
    ///
    /// Labels: endpoint
    pub const GATEWAY_LATENCY: Metric = Metric::histogram("geohaz.gateway.latency_ms")
        .with_description("Remote compute round-trip latency in milliseconds")
        .with_unit(Unit::Milliseconds)
        .with_labels(&["endpoint"]);

    // ========================================================================
    // Operation Pipeline
    // ========================================================================

    /// Operation invocations.
    ///
    /// Labels: operation
    pub const OPERATION_CALLS: Metric = Metric::counter("geohaz.ops.calls")
        .with_description("Pipeline operations invoked")
        .with_unit(Unit::Count)
        .with_labels(&["operation"]);

    /// Operation failures.
    ///
    /// Labels: operation, category (`validation` or `remote`)
    pub const OPERATION_FAILURES: Metric = Metric::counter("geohaz.ops.failures")
        .with_description("Pipeline operations that returned an error")
        .with_unit(Unit::Count)
        .with_labels(&["operation", "category"]);

    /// Size of handles returned by operations.
    ///
    /// Labels: operation
    pub const HANDLE_SIZE: Metric = Metric::histogram("geohaz.ops.handle_size_bytes")
        .with_description("Size of serialized handles returned by operations")
        .with_unit(Unit::Bytes)
        .with_labels(&["operation"]);

    // ========================================================================
    // Tool surface
    // ========================================================================

    /// Connected TCP clients.
    pub const SERVER_CONNECTIONS: Metric = Metric::gauge("geohaz.server.connections")
        .with_description("Currently connected tool clients")
        .with_unit(Unit::Count);

    /// All metrics, for registration at startup.
    pub const ALL: &[&Metric] = &[
        &GATEWAY_REQUESTS,
        &GATEWAY_ERRORS,
        &GATEWAY_LATENCY,
        &OPERATION_CALLS,
        &OPERATION_FAILURES,
        &HANDLE_SIZE,
        &SERVER_CONNECTIONS,
    ];
}

/// Labels identifying a pipeline operation.
#[derive(Debug, Clone)]
pub struct OperationLabels {
    /// Operation name, e.g. `filter_image_by_threshold`.
    pub operation: &'static str,
}

impl OperationLabels {
    /// Labels for the given operation.
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }

    /// Convert to the `metrics` label format.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        vec![("operation", self.operation.to_string())]
    }

    /// Labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Register descriptions of every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Install a Prometheus exporter listening on `addr` and describe all metrics.
///
/// Must be called from within a Tokio runtime.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
