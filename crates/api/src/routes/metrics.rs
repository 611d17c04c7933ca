//! Prometheus metrics endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::AppState;

/// GET /metrics: Prometheus-formatted metrics, including the outbox backlog.
pub async fn get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.outbox.pending_count().await {
        Ok(pending) => metrics::gauge!("outbox_pending_messages").set(pending as f64),
        Err(e) => tracing::warn!(error = %e, "failed to count pending outbox messages"),
    }

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.metrics.render(),
    )
}
