//! Prometheus metrics for the drops feed service

use std::time::Duration;

use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drops_feed_http_requests_total",
        "Total HTTP requests handled by the drops feed service",
        &["method", "path", "status"]
    )
    .expect("failed to register drops_feed_http_requests_total")
});

static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "drops_feed_http_request_duration_seconds",
        "HTTP request latency for the drops feed service",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("failed to register drops_feed_http_request_duration_seconds")
});

static FEED_ASSEMBLY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "drops_feed_assembly_duration_seconds",
        "Time to assemble one feed page (cache hits included)",
        &["feed_type", "source"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("failed to register drops_feed_assembly_duration_seconds")
});

static FEED_CANDIDATES_SCORED: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "drops_feed_candidates_scored",
        "Candidates scored per feed assembly",
        &["feed_type"],
        vec![0.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0]
    )
    .expect("failed to register drops_feed_candidates_scored")
});

static FEED_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drops_feed_cache_lookups_total",
        "First-page cache lookups by outcome (hit/miss/expired/error)",
        &["outcome"]
    )
    .expect("failed to register drops_feed_cache_lookups_total")
});

static FEED_CACHE_SWEPT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "drops_feed_cache_swept_total",
        "Expired feed cache entries removed by the sweeper"
    )
    .expect("failed to register drops_feed_cache_swept_total")
});

static PAGINATION_RESTARTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "drops_feed_pagination_restarts_total",
        "Cursors that no longer matched a ranked item and restarted from the top"
    )
    .expect("failed to register drops_feed_pagination_restarts_total")
});

static UPSTREAM_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drops_feed_upstream_failures_total",
        "Failed or timed out upstream calls",
        &["upstream", "reason"]
    )
    .expect("failed to register drops_feed_upstream_failures_total")
});

static POSTING_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drops_posting_decisions_total",
        "Posting limiter decisions (accepted/rejected)",
        &["outcome"]
    )
    .expect("failed to register drops_posting_decisions_total")
});

static INTERACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "drops_interactions_total",
        "Interactions fed into interest profiles",
        &["kind"]
    )
    .expect("failed to register drops_interactions_total")
});

static POSTING_WINDOWS_TRACKED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "drops_posting_windows_tracked",
        "Authors with a live posting window"
    )
    .expect("failed to register drops_posting_windows_tracked")
});

pub fn observe_http_request(method: &str, path: &str, status: u16, elapsed: Duration) {
    let status_label = status.to_string();
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status_label])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path, &status_label])
        .observe(elapsed.as_secs_f64());
}

/// `source` is `cache` or `ranked`.
pub fn observe_feed_assembly(feed_type: &str, source: &str, elapsed: Duration) {
    FEED_ASSEMBLY_SECONDS
        .with_label_values(&[feed_type, source])
        .observe(elapsed.as_secs_f64());
}

pub fn observe_candidates_scored(feed_type: &str, count: usize) {
    FEED_CANDIDATES_SCORED
        .with_label_values(&[feed_type])
        .observe(count as f64);
}

pub fn record_cache_lookup(outcome: &str) {
    FEED_CACHE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_cache_swept(count: usize) {
    FEED_CACHE_SWEPT_TOTAL.inc_by(count as u64);
}

pub fn record_pagination_restart() {
    PAGINATION_RESTARTS_TOTAL.inc();
}

pub fn record_upstream_failure(upstream: &str, reason: &str) {
    UPSTREAM_FAILURES_TOTAL
        .with_label_values(&[upstream, reason])
        .inc();
}

pub fn record_posting_decision(outcome: &str) {
    POSTING_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_interaction(kind: &str) {
    INTERACTIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn set_posting_windows_tracked(count: usize) {
    POSTING_WINDOWS_TRACKED.set(count as i64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_serve_metrics_exposes_registered_families() {
        record_cache_lookup("hit");
        record_posting_decision("accepted");

        let resp = serve_metrics().await;
        assert!(resp.status().is_success());
    }

    #[test]
    fn test_cache_lookup_counter_increments() {
        let before = FEED_CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).get();
        record_cache_lookup("miss");
        assert!(FEED_CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).get() > before);
    }
}
