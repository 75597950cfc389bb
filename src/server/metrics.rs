use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::sync::FetchResult;

const PREFIX: &str = "scrobble_sync";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref FETCH_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_fetch_runs_total"), "Fetch runs by outcome"),
        &["outcome"]
    ).expect("Failed to create fetch_runs_total metric");

    pub static ref FETCH_ITEMS_STORED_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_fetch_items_stored_total"),
        "Plays stored by fetch runs"
    ).expect("Failed to create fetch_items_stored_total metric");

    pub static ref FETCH_REQUESTS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_fetch_requests_total"),
        "Remote requests issued by fetch runs"
    ).expect("Failed to create fetch_requests_total metric");

    pub static ref SCHEDULER_WAKES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_scheduler_wakes_total"), "Scheduler wake-ups by source and decision"),
        &["source", "decision"]
    ).expect("Failed to create scheduler_wakes_total metric");

    pub static ref LIVE_CLIENTS: Gauge = Gauge::new(
        format!("{PREFIX}_live_clients"),
        "Currently connected live clients"
    ).expect("Failed to create live_clients metric");

    pub static ref NOTIFICATIONS_SENT_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_notifications_total"), "Update notifications by delivery result"),
        &["result"]
    ).expect("Failed to create notifications_total metric");
}

/// Registers every metric. Safe to call more than once.
pub fn init_metrics() {
    let _ = REGISTRY.register(Box::new(FETCH_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FETCH_ITEMS_STORED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FETCH_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULER_WAKES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(LIVE_CLIENTS.clone()));
    let _ = REGISTRY.register(Box::new(NOTIFICATIONS_SENT_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

pub fn record_fetch_result(result: &FetchResult) {
    let outcome = match (result.complete, result.errors.is_empty()) {
        (true, true) => "complete",
        (true, false) => "complete_with_errors",
        (false, true) => "partial",
        (false, false) => "failed",
    };
    FETCH_RUNS_TOTAL.with_label_values(&[outcome]).inc();
    FETCH_ITEMS_STORED_TOTAL.inc_by(result.new_item_count as f64);
    FETCH_REQUESTS_TOTAL.inc_by(f64::from(result.request_count));
}

pub fn record_fetch_error() {
    FETCH_RUNS_TOTAL.with_label_values(&["error"]).inc();
}

pub fn record_scheduler_wake(source: &str, decision: &str) {
    SCHEDULER_WAKES_TOTAL
        .with_label_values(&[source, decision])
        .inc();
}

pub fn record_notifications(delivered: usize, dropped: usize) {
    NOTIFICATIONS_SENT_TOTAL
        .with_label_values(&["delivered"])
        .inc_by(delivered as f64);
    NOTIFICATIONS_SENT_TOTAL
        .with_label_values(&["dropped"])
        .inc_by(dropped as f64);
}

pub fn set_live_clients(count: usize) {
    LIVE_CLIENTS.set(count as f64);
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
