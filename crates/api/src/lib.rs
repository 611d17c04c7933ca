//! HTTP API and process wiring for the VIP bundle saga.
//!
//! `POST /book-vip-bundle` is the only write: it stores the bundle and its
//! first event and returns. Everything after that runs in the background
//! [`runtime::Runtime`] and is observable through the bundle and ops booking
//! queries, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod runtime;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use messaging::ForwarderHealth;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::OpsBookingStore;
use saga::VipBundleService;
use store::{OutboxStore, SagaStore};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use runtime::Stores;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub vip_bundles: VipBundleService<Arc<dyn SagaStore>>,
    pub ops_bookings: Arc<dyn OpsBookingStore>,
    pub outbox: Arc<dyn OutboxStore>,
    pub forwarder_health: watch::Receiver<ForwarderHealth>,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Creates the state shared by all handlers.
    pub fn new(
        stores: &Stores,
        forwarder_health: watch::Receiver<ForwarderHealth>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            vip_bundles: stores.vip_bundles(),
            ops_bookings: stores.ops_bookings.clone(),
            outbox: stores.outbox.clone(),
            forwarder_health,
            metrics,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .route("/book-vip-bundle", post(routes::vip_bundles::book))
        .route("/vip-bundles/{id}", get(routes::vip_bundles::get))
        .route("/ops/bookings", get(routes::ops_bookings::list))
        .route("/ops/bookings/{id}", get(routes::ops_bookings::get))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
