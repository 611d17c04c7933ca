//! VIP bundle booking and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::VipBundleId;
use domain::{VipBundle, VipBundleStage};
use saga::{BookVipBundle, BookedVipBundle};
use serde::Serialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct VipBundleResponse {
    pub stage: VipBundleStage,
    #[serde(flatten)]
    pub bundle: VipBundle,
}

/// POST /book-vip-bundle: accepts a VIP bundle for processing.
///
/// Returns 201 once the bundle is stored; the bookings happen afterwards.
#[tracing::instrument(skip(state, req))]
pub async fn book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookVipBundle>,
) -> Result<(StatusCode, Json<BookedVipBundle>), ApiError> {
    let booked = state.vip_bundles.book_vip_bundle(req).await?;
    Ok((StatusCode::CREATED, Json(booked)))
}

/// GET /vip-bundles/{id}: the bundle with its current stage.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<VipBundleResponse>, ApiError> {
    let id: VipBundleId = parse_id(&id)?;
    let bundle = state.vip_bundles.get(id).await?;
    Ok(Json(VipBundleResponse {
        stage: bundle.stage(),
        bundle,
    }))
}
