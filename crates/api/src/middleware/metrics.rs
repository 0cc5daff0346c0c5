//! Prometheus metrics: HTTP middleware, workflow counters and the
//! `/metrics` endpoint.

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{header, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::app::AppState;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Records `http_requests_total` and `http_request_duration_seconds`,
/// labelled by the matched route rather than the raw path.
pub async fn metrics_middleware(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = method_to_str(req.method());
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    counter!(
        "http_requests_total",
        "method" => method,
        "path" => path.clone(),
        "status" => status
    )
    .increment(1);
    histogram!(
        "http_request_duration_seconds",
        "method" => method,
        "path" => path
    )
    .record(start.elapsed().as_secs_f64());

    response
}

fn method_to_str(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "OTHER",
    }
}

/// Leads created by an import.
pub fn record_leads_imported(created: usize, duplicates: usize, invalid: usize) {
    counter!("leads_imported_total", "outcome" => "created").increment(created as u64);
    counter!("leads_imported_total", "outcome" => "duplicate").increment(duplicates as u64);
    counter!("leads_imported_total", "outcome" => "invalid").increment(invalid as u64);
}

/// A lead changed hands. `target` is `company`, `agent` or `partner`.
pub fn record_lead_assigned(target: &'static str, count: usize) {
    counter!("lead_assignments_total", "target" => target).increment(count as u64);
}

/// A lead request reached `outcome` (created, approved, rejected, cancelled,
/// quota_exceeded).
pub fn record_lead_request(outcome: &'static str) {
    counter!("lead_requests_total", "outcome" => outcome).increment(1);
}

/// A return moved to `status`.
pub fn record_lead_return(status: &'static str) {
    counter!("lead_returns_total", "status" => status).increment(1);
}

/// A partner or messaging call finished with `outcome` (ok, soft, hard).
pub fn record_integration_call(collaborator: &'static str, outcome: &'static str) {
    counter!(
        "integration_calls_total",
        "collaborator" => collaborator,
        "outcome" => outcome
    )
    .increment(1);
}

/// Handler for `/metrics`; refreshes pool gauges before rendering.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    persistence::metrics::record_pool_metrics(&state.pool);

    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not initialized".to_string(),
        ),
    }
}

/// Installs the global Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(&[0.001, 0.005, 0.01, 0.05, 0.1, 0.2, 0.5, 1.0, 2.0, 5.0])?
        .install_recorder()?;

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus recorder was already initialized");
    }
    Ok(())
}
