//! Prometheus metrics
//!
//! The recorder is installed once per process; `/metrics` renders it.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::ServerError;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder. Calling it again returns the same handle.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    HANDLE
        .get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| ServerError::Internal(format!("metrics recorder: {}", e)))?;
            describe_metrics();
            Ok(handle)
        })
        .cloned()
}

fn describe_metrics() {
    metrics::describe_counter!("robot_chat_turns_total", "Turns handled, by kind and outcome");
    metrics::describe_histogram!(
        "robot_chat_turn_duration_seconds",
        metrics::Unit::Seconds,
        "Time from turn request to reply"
    );
    metrics::describe_counter!("robot_chat_sentences_total", "Sentences sent to speech");
    metrics::describe_counter!(
        "robot_chat_dispatch_errors_total",
        "Swallowed speech and motion failures"
    );
    metrics::describe_counter!("robot_chat_engagements_total", "Idle to engaged transitions");
    metrics::describe_counter!("robot_chat_http_requests_total", "HTTP requests by route");
    metrics::describe_counter!("robot_chat_frames_dropped_total", "Tracker frames dropped");
}

/// GET /metrics
pub async fn metrics_handler() -> impl IntoResponse {
    match HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "metrics disabled".to_string(),
        ),
    }
}

pub fn record_request(route: &'static str, status: StatusCode) {
    metrics::counter!(
        "robot_chat_http_requests_total",
        "route" => route,
        "status" => status.as_u16().to_string()
    )
    .increment(1);
}
