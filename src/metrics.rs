//! Prometheus metrics for the webhook proxy.
//!
//! All metric types use atomics internally (no locks on the hot path).
//! The `Metrics` struct is `Clone`-cheap (Arc-based registry + Arc-based collectors).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    TEXT_FORMAT,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::api::handlers::AppState;

/// All Prometheus metrics for the webhook proxy.
#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // -- HTTP Requests --
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,

    // -- Webhook pipeline --
    pub verifications_total: IntCounterVec,
    pub forwards_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        register_process_metrics(&registry);

        let http_requests_total = IntCounterVec::new(
            Opts::new(
                "hwp_http_requests_total",
                "Total HTTP requests by method, status, and operation",
            ),
            &["method", "status", "operation"],
        )
        .unwrap();
        registry
            .register(Box::new(http_requests_total.clone()))
            .unwrap();

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "hwp_http_request_duration_seconds",
                "HTTP request duration in seconds",
            ),
            &["method", "operation"],
        )
        .unwrap();
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .unwrap();

        let verifications_total = IntCounterVec::new(
            Opts::new(
                "hwp_verifications_total",
                "Webhook signature verifications by outcome",
            ),
            &["outcome"],
        )
        .unwrap();
        registry
            .register(Box::new(verifications_total.clone()))
            .unwrap();

        let forwards_total = IntCounterVec::new(
            Opts::new(
                "hwp_forwards_total",
                "Deliveries forwarded to the origin by origin status (or \"error\")",
            ),
            &["status"],
        )
        .unwrap();
        registry.register(Box::new(forwards_total.clone())).unwrap();

        Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            verifications_total,
            forwards_total,
        }
    }

    pub fn record_verification(&self, outcome: &str) {
        self.verifications_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_forward(&self, status: &str) {
        self.forwards_total.with_label_values(&[status]).inc();
    }
}

/// Process metrics: RSS, CPU, open FDs and start time on Linux, where the
/// collector provides `process_start_time_seconds` itself. Elsewhere only the
/// start time is exported.
#[cfg(target_os = "linux")]
fn register_process_metrics(registry: &Registry) {
    let collector = prometheus::process_collector::ProcessCollector::for_self();
    if let Err(e) = registry.register(Box::new(collector)) {
        warn!("Failed to register process metrics: {}", e);
    }
}

#[cfg(not(target_os = "linux"))]
fn register_process_metrics(registry: &Registry) {
    let start_time =
        prometheus::Gauge::new("process_start_time_seconds", "Start time of the process").unwrap();
    start_time.set(chrono::Utc::now().timestamp() as f64);
    if let Err(e) = registry.register(Box::new(start_time)) {
        warn!("Failed to register process start time: {}", e);
    }
}

/// Classify a request path into a low-cardinality operation label.
pub fn classify_operation(path: &str) -> &'static str {
    match path {
        "/health" => "health",
        "/metrics" => "metrics",
        _ => "webhook",
    }
}

/// Axum middleware that records HTTP request metrics.
pub async fn http_metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => return next.run(request).await,
    };

    let method = request.method().to_string();
    let operation = classify_operation(request.uri().path());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed().as_secs_f64();

    let status = response.status().as_u16().to_string();

    metrics
        .http_requests_total
        .with_label_values(&[&method, &status, operation])
        .inc();
    metrics
        .http_request_duration_seconds
        .with_label_values(&[&method, operation])
        .observe(duration);

    response
}

/// Handler for GET /metrics: returns Prometheus text format.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = match &state.metrics {
        Some(m) => m,
        None => {
            return (StatusCode::NOT_FOUND, "Metrics not enabled").into_response();
        }
    };

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response();
    }

    (StatusCode::OK, [("content-type", TEXT_FORMAT)], buffer).into_response()
}
