//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in the
//! middleware. Ledger gauges (today's rows by status, connected viewers,
//! ephemeral signing key) are refreshed on each `/metrics` scrape, see the
//! handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{Encoder, GaugeVec, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Ledger gauges (pull model, updated on /metrics scrape) --
    attendance_today: GaugeVec,
    event_viewers: IntGauge,
    signing_key_ephemeral: IntGauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("rollcall_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "rollcall_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("rollcall_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let attendance_today = GaugeVec::new(
            Opts::new(
                "rollcall_attendance_today",
                "Rows in today's ledger by status",
            ),
            &["status"],
        )
        .expect("metric can be created");

        let event_viewers = IntGauge::new(
            "rollcall_event_viewers",
            "Connected live-event viewers",
        )
        .expect("metric can be created");

        let signing_key_ephemeral = IntGauge::new(
            "rollcall_signing_key_ephemeral",
            "Whether the credential signing key is ephemeral (1=ephemeral, 0=configured)",
        )
        .expect("metric can be created");

        for collector in [
            Box::new(http_requests_total.clone()) as Box<dyn Collector>,
            Box::new(http_request_duration_seconds.clone()),
            Box::new(http_errors_total.clone()),
            Box::new(attendance_today.clone()),
            Box::new(event_viewers.clone()),
            Box::new(signing_key_ephemeral.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric can be registered");
        }

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                attendance_today,
                event_viewers,
                signing_key_ephemeral,
            }),
        }
    }

    /// Total request count across all labels.
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count across all labels.
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Today's rows by status.
    pub fn attendance_today(&self) -> &GaugeVec {
        &self.inner.attendance_today
    }

    /// Connected SSE viewers.
    pub fn event_viewers(&self) -> &IntGauge {
        &self.inner.event_viewers
    }

    /// 1 when credentials are signed with a key generated at startup.
    pub fn signing_key_ephemeral(&self) -> &IntGauge {
        &self.inner.signing_key_ephemeral
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|family| family.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Replace numeric path segments (student and class ids) with `{id}` to
/// bound label cardinality.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        m.record_request(&method, &path, response.status().as_u16(), duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metrics_start_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn errors_count_only_4xx_and_5xx() {
        let m = ApiMetrics::new();
        m.record_request("POST", "/v1/check-in", 200, 0.01);
        m.record_request("POST", "/v1/check-in", 401, 0.01);
        m.record_request("PATCH", "/v1/attendance", 503, 0.2);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn clone_shares_underlying_counters() {
        let m = ApiMetrics::new();
        let clone = m.clone();
        m.record_request("GET", "/v1/attendance", 200, 0.01);
        assert_eq!(clone.requests(), 1);
    }

    #[test]
    fn normalize_path_replaces_ids() {
        assert_eq!(
            normalize_path("/v1/students/42/credential"),
            "/v1/students/{id}/credential"
        );
        assert_eq!(
            normalize_path("/v1/classes/7/summary"),
            "/v1/classes/{id}/summary"
        );
        assert_eq!(normalize_path("/v1/attendance/today"), "/v1/attendance/today");
    }

    #[test]
    fn gauges_appear_in_scrape() {
        let m = ApiMetrics::new();
        m.attendance_today().with_label_values(&["present"]).set(12.0);
        m.event_viewers().set(3);
        m.signing_key_ephemeral().set(1);
        m.record_request("GET", "/v1/events", 200, 0.001);
        let output = m.gather_and_encode().unwrap();
        assert!(output.contains("rollcall_attendance_today"));
        assert!(output.contains("rollcall_event_viewers 3"));
        assert!(output.contains("rollcall_signing_key_ephemeral 1"));
        assert!(output.contains("rollcall_http_request_duration_seconds"));
    }
}
