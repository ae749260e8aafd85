use std::sync::Arc;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

use crate::error::Result;

const REQUEST_LABELS: &[&str] =
    &["frontend", "address", "host", "path", "method", "backend", "server", "code"];
const REQUEST_ERROR_LABELS: &[&str] =
    &["frontend", "address", "host", "path", "method", "backend", "server", "code", "error"];
const CONNECTION_LABELS: &[&str] = &["frontend", "address"];

/// Frontend metric vectors registered against an injected registry.
///
/// Construct once per process and share across frontends; each frontend
/// curries its own name in through [`Metrics::for_frontend`].
pub struct Metrics {
    read_bytes: IntCounterVec,
    write_bytes: IntCounterVec,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    active_connections: IntGaugeVec,
    idle_connections: IntGaugeVec,
}

impl Metrics {
    pub fn new(namespace: &str, registry: &Registry) -> Result<Arc<Self>> {
        let read_bytes = IntCounterVec::new(
            Opts::new("http_frontend_read_bytes", "Bytes read from clients")
                .namespace(namespace),
            REQUEST_LABELS,
        )?;
        registry.register(Box::new(read_bytes.clone()))?;

        let write_bytes = IntCounterVec::new(
            Opts::new("http_frontend_write_bytes", "Bytes written to clients")
                .namespace(namespace),
            REQUEST_LABELS,
        )?;
        registry.register(Box::new(write_bytes.clone()))?;

        let requests_total = IntCounterVec::new(
            Opts::new("http_frontend_requests_total", "Requests served, by terminating cause")
                .namespace(namespace),
            REQUEST_ERROR_LABELS,
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_frontend_request_duration_seconds",
                "Wall-clock request duration for clean completions",
            )
            .namespace(namespace)
            .buckets(duration_buckets()),
            REQUEST_LABELS,
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        let active_connections = IntGaugeVec::new(
            Opts::new("http_frontend_active_connections", "Connections serving a request")
                .namespace(namespace),
            CONNECTION_LABELS,
        )?;
        registry.register(Box::new(active_connections.clone()))?;

        let idle_connections = IntGaugeVec::new(
            Opts::new("http_frontend_idle_connections", "Connections waiting for a request")
                .namespace(namespace),
            CONNECTION_LABELS,
        )?;
        registry.register(Box::new(idle_connections.clone()))?;

        Ok(Arc::new(Self {
            read_bytes,
            write_bytes,
            requests_total,
            request_duration_seconds,
            active_connections,
            idle_connections,
        }))
    }

    /// Curry the vectors with one frontend's name.
    pub fn for_frontend(self: &Arc<Self>, frontend: &str) -> FrontendMetrics {
        FrontendMetrics { shared: self.clone(), frontend: frontend.to_string() }
    }
}

/// Request duration buckets: 0.05 s to 1.00 s in 0.05 s steps, extended down
/// to 5 ms and up to 100 s.
fn duration_buckets() -> Vec<f64> {
    let mut buckets = vec![0.005, 0.01, 0.025];
    buckets.extend((1..=20u32).map(|i| f64::from(i * 5) / 100.0));
    buckets.extend([2.5, 5.0, 10.0, 25.0, 50.0, 100.0]);
    buckets
}

/// Per-request label values apart from the curried frontend name.
pub struct RequestLabels<'a> {
    pub address: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub method: &'a str,
    pub backend: &'a str,
    pub server: &'a str,
    pub code: &'a str,
}

impl RequestLabels<'_> {
    fn values<'s>(&'s self, frontend: &'s str) -> [&'s str; 8] {
        [
            frontend,
            self.address,
            self.host,
            self.path,
            self.method,
            self.backend,
            self.server,
            self.code,
        ]
    }
}

/// Metric handles pre-curried with one frontend's name.
#[derive(Clone)]
pub struct FrontendMetrics {
    shared: Arc<Metrics>,
    frontend: String,
}

impl FrontendMetrics {
    pub(crate) fn idle_connections(&self, address: &str) -> IntGauge {
        self.shared.idle_connections.with_label_values(&[self.frontend.as_str(), address])
    }

    pub(crate) fn active_connections(&self, address: &str) -> IntGauge {
        self.shared.active_connections.with_label_values(&[self.frontend.as_str(), address])
    }

    pub(crate) fn add_transfer(&self, labels: &RequestLabels<'_>, read: u64, write: u64) {
        let values = labels.values(&self.frontend);
        self.shared.read_bytes.with_label_values(&values).inc_by(read);
        self.shared.write_bytes.with_label_values(&values).inc_by(write);
    }

    pub(crate) fn inc_requests(&self, labels: &RequestLabels<'_>, error: &str) {
        let values = labels.values(&self.frontend);
        let mut with_error = [""; 9];
        with_error[..8].copy_from_slice(&values);
        with_error[8] = error;
        self.shared.requests_total.with_label_values(&with_error).inc();
    }

    pub(crate) fn observe_duration(&self, labels: &RequestLabels<'_>, seconds: f64) {
        let values = labels.values(&self.frontend);
        self.shared.request_duration_seconds.with_label_values(&values).observe(seconds);
    }
}
