//! Ops booking read model queries.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::BookingId;
use projections::OpsBooking;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

/// GET /ops/bookings: every booking, most recently booked first.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OpsBooking>>, ApiError> {
    Ok(Json(state.ops_bookings.list().await?))
}

/// GET /ops/bookings/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OpsBooking>, ApiError> {
    let booking_id: BookingId = parse_id(&id)?;
    state
        .ops_bookings
        .get(booking_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Ops booking {id} not found")))
}
