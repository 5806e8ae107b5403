//! Prometheus metrics registry and the `/metrics` handler.

use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

const PREFIX: &str = "catalog_search";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_search_requests_total"), "Total /search requests"),
        &["status"]
    ).expect("failed to create search_requests_total metric");

    pub static ref SEARCH_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_search_duration_seconds"),
            "End-to-end /search request duration in seconds"
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])
    ).expect("failed to create search_duration_seconds metric");

    pub static ref EMBEDDING_FAILURES_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_embedding_failures_total"),
        "Total embedding client failures observed at query time"
    ).expect("failed to create embedding_failures_total metric");

    pub static ref FACET_DEGRADATIONS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_facet_degradations_total"),
        "Total requests where facet composition degraded to results-only"
    ).expect("failed to create facet_degradations_total metric");

    pub static ref FACETS_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_facets_requests_total"), "Total /facets requests"),
        &["status"]
    ).expect("failed to create facets_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["method", "path"]
    ).expect("failed to create http_request_duration_seconds metric");
}

pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SEARCH_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(EMBEDDING_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FACET_DEGRADATIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FACETS_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let body = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, body)
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to encode metrics: {e}"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_initialize_without_panicking() {
        init_metrics();
        let families = REGISTRY.gather();
        assert!(!families.is_empty());
    }
}
