//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use messaging::ForwarderHealth;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub forwarder: ForwarderStatus,
}

#[derive(Serialize)]
pub struct ForwarderStatus {
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub restarts: u32,
}

/// GET /health: 200 while the outbox forwarder is healthy, 503 otherwise.
pub async fn check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let health = state.forwarder_health.borrow().clone();
    let (status, code) = if health.is_healthy() {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    let forwarder = match health {
        ForwarderHealth::Degraded { error, restarts } => ForwarderStatus {
            state: "degraded",
            error: Some(error),
            restarts,
        },
        other => ForwarderStatus {
            state: other.as_str(),
            error: None,
            restarts: 0,
        },
    };

    (code, Json(HealthResponse { status, forwarder }))
}
