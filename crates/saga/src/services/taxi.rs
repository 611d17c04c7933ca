//! Taxi service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{TaxiBookingId, VipBundleId};
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct TaxiBookingRequest {
    pub customer_email: String,
    pub customer_name: String,
    pub number_of_passengers: u32,
    pub reference_id: VipBundleId,
    pub idempotency_key: String,
}

/// Trait for taxi bookings.
#[async_trait]
pub trait TaxiService: Send + Sync {
    async fn book_taxi(&self, request: TaxiBookingRequest)
    -> Result<TaxiBookingId, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryTaxiState {
    bookings: HashMap<String, TaxiBookingId>,
    max_passengers: Option<u32>,
    fault: Option<Fault>,
}

/// In-memory taxi service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaxiService {
    state: Arc<RwLock<InMemoryTaxiState>>,
}

impl InMemoryTaxiService {
    /// Creates a new service with no bookings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with `fault`.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    /// Rejects rides for more passengers than `max`.
    pub async fn set_max_passengers(&self, max: u32) {
        self.state.write().await.max_passengers = Some(max);
    }

    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }
}

#[async_trait]
impl TaxiService for InMemoryTaxiService {
    async fn book_taxi(
        &self,
        request: TaxiBookingRequest,
    ) -> Result<TaxiBookingId, ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "taxi booking")?;

        if let Some(existing) = state.bookings.get(&request.idempotency_key) {
            return Ok(*existing);
        }
        if let Some(max) = state.max_passengers
            && request.number_of_passengers > max
        {
            return Err(ServiceError::Rejected(format!(
                "no taxi for {} passengers",
                request.number_of_passengers
            )));
        }

        let taxi_booking_id = TaxiBookingId::new();
        state
            .bookings
            .insert(request.idempotency_key, taxi_booking_id);
        Ok(taxi_booking_id)
    }
}
