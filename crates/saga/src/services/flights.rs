//! Flight service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{FlightId, FlightTicketId, VipBundleId};
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct FlightBookingRequest {
    pub customer_email: String,
    pub flight_id: FlightId,
    pub passengers: Vec<String>,
    pub reference_id: VipBundleId,
    pub idempotency_key: String,
}

/// Trait for flight ticket operations.
#[async_trait]
pub trait FlightService: Send + Sync {
    /// Books one ticket per passenger and returns the ticket ids.
    async fn book_flight(
        &self,
        request: FlightBookingRequest,
    ) -> Result<Vec<FlightTicketId>, ServiceError>;

    /// Cancels flight tickets. Cancelling a cancelled ticket succeeds.
    async fn cancel_flight_tickets(&self, ticket_ids: &[FlightTicketId])
    -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryFlightState {
    bookings: HashMap<String, Vec<FlightTicketId>>,
    active: HashSet<FlightTicketId>,
    cancelled: HashSet<FlightTicketId>,
    rejected_flights: HashSet<FlightId>,
    fault: Option<Fault>,
    cancel_fault: Option<Fault>,
}

/// In-memory flight service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFlightService {
    state: Arc<RwLock<InMemoryFlightState>>,
}

impl InMemoryFlightService {
    /// Creates a new service with no bookings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fault for bookings.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    /// Sets the fault for cancellations.
    pub async fn set_cancel_fault(&self, fault: Option<Fault>) {
        self.state.write().await.cancel_fault = fault;
    }

    /// Refuses bookings for one flight only.
    pub async fn reject_flight(&self, flight_id: FlightId) {
        self.state.write().await.rejected_flights.insert(flight_id);
    }

    pub async fn active_ticket_count(&self) -> usize {
        self.state.read().await.active.len()
    }

    pub async fn is_cancelled(&self, ticket_id: FlightTicketId) -> bool {
        self.state.read().await.cancelled.contains(&ticket_id)
    }
}

#[async_trait]
impl FlightService for InMemoryFlightService {
    async fn book_flight(
        &self,
        request: FlightBookingRequest,
    ) -> Result<Vec<FlightTicketId>, ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "flight booking")?;

        if let Some(existing) = state.bookings.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }
        if state.rejected_flights.contains(&request.flight_id) {
            return Err(ServiceError::Rejected(format!(
                "flight {} is fully booked",
                request.flight_id
            )));
        }

        let tickets: Vec<_> = request
            .passengers
            .iter()
            .map(|_| FlightTicketId::new())
            .collect();
        state.active.extend(tickets.iter().copied());
        state
            .bookings
            .insert(request.idempotency_key, tickets.clone());
        Ok(tickets)
    }

    async fn cancel_flight_tickets(
        &self,
        ticket_ids: &[FlightTicketId],
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.cancel_fault, "flight cancellation")?;

        for ticket_id in ticket_ids {
            state.active.remove(ticket_id);
            state.cancelled.insert(*ticket_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(flight_id: FlightId, key: &str) -> FlightBookingRequest {
        FlightBookingRequest {
            customer_email: "vip@example.com".to_string(),
            flight_id,
            passengers: vec!["A".to_string(), "B".to_string()],
            reference_id: VipBundleId::new(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_book_is_idempotent() {
        let service = InMemoryFlightService::new();
        let flight_id = FlightId::new();

        let first = service.book_flight(request(flight_id, "k1")).await.unwrap();
        let again = service.book_flight(request(flight_id, "k1")).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(first.len(), 2);
        assert_eq!(service.active_ticket_count().await, 2);
    }

    #[tokio::test]
    async fn test_cancel() {
        let service = InMemoryFlightService::new();
        let tickets = service
            .book_flight(request(FlightId::new(), "k1"))
            .await
            .unwrap();

        service.cancel_flight_tickets(&tickets).await.unwrap();
        service.cancel_flight_tickets(&tickets).await.unwrap();

        assert_eq!(service.active_ticket_count().await, 0);
        assert!(service.is_cancelled(tickets[0]).await);
    }

    #[tokio::test]
    async fn test_rejected_flight() {
        let service = InMemoryFlightService::new();
        let flight_id = FlightId::new();
        service.reject_flight(flight_id).await;

        let result = service.book_flight(request(flight_id, "k1")).await;
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
        assert!(
            service
                .book_flight(request(FlightId::new(), "k2"))
                .await
                .is_ok()
        );
    }
}
