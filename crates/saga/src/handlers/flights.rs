use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BookFlight, CancelFlightTickets, Event, EventHeader, FlightBooked, FlightBookingFailed,
    MessageKind,
};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use store::OutboxStore;
use tracing::{info, instrument};

use super::{decode, emit};
use crate::error::{SagaError, ServiceError};
use crate::services::{FlightBookingRequest, FlightService};

/// Books one flight leg.
pub struct BookFlightHandler {
    flights: Arc<dyn FlightService>,
    outbox: Arc<dyn OutboxStore>,
}

impl BookFlightHandler {
    /// Creates a new flight booking handler.
    pub fn new(flights: Arc<dyn FlightService>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { flights, outbox }
    }

    /// Books the flight and reports the outcome.
    #[instrument(skip_all, fields(reference_id = %command.reference_id, flight_id = %command.flight_id))]
    pub async fn book_flight(&self, command: &BookFlight) -> crate::Result<HandlerOutcome> {
        let request = FlightBookingRequest {
            customer_email: command.customer_email.clone(),
            flight_id: command.flight_id,
            passengers: command.passengers.clone(),
            reference_id: command.reference_id,
            idempotency_key: command.idempotency_key.clone(),
        };

        let event = match self.flights.book_flight(request).await {
            Ok(ticket_ids) => Event::FlightBooked(FlightBooked {
                header: EventHeader::for_fact(
                    command.idempotency_key.clone(),
                    MessageKind::FlightBooked.as_str(),
                ),
                flight_id: command.flight_id,
                ticket_ids,
                reference_id: command.reference_id,
            }),
            Err(ServiceError::Rejected(reason)) => {
                info!(%reason, "Flight booking rejected");
                Event::FlightBookingFailed(FlightBookingFailed {
                    header: EventHeader::for_fact(
                        command.idempotency_key.clone(),
                        MessageKind::FlightBookingFailed.as_str(),
                    ),
                    flight_id: command.flight_id,
                    reference_id: command.reference_id,
                    failure_reason: reason,
                })
            }
            Err(e) => return Err(SagaError::service("flights", e)),
        };

        emit(self.outbox.as_ref(), &[event]).await
    }
}

#[async_trait]
impl MessageHandler for BookFlightHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let command: BookFlight = decode(message)?;
        Ok(self.book_flight(&command).await?)
    }
}

/// Cancels flight tickets during compensation.
///
/// A refusal is not expected here and ends up on the poison topic.
pub struct CancelFlightTicketsHandler {
    flights: Arc<dyn FlightService>,
}

impl CancelFlightTicketsHandler {
    /// Creates a new cancellation handler.
    pub fn new(flights: Arc<dyn FlightService>) -> Self {
        Self { flights }
    }

    #[instrument(skip_all, fields(tickets = command.flight_ticket_ids.len()))]
    pub async fn cancel_flight_tickets(
        &self,
        command: &CancelFlightTickets,
    ) -> crate::Result<HandlerOutcome> {
        self.flights
            .cancel_flight_tickets(&command.flight_ticket_ids)
            .await
            .map_err(|e| SagaError::service("flights", e))?;
        Ok(HandlerOutcome::Handled)
    }
}

#[async_trait]
impl MessageHandler for CancelFlightTicketsHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let command: CancelFlightTickets = decode(message)?;
        Ok(self.cancel_flight_tickets(&command).await?)
    }
}

#[cfg(test)]
mod tests {
    use common::{FlightId, VipBundleId};
    use store::InMemoryStore;

    use super::*;
    use crate::services::{Fault, InMemoryFlightService};

    fn command(flight_id: FlightId) -> BookFlight {
        BookFlight {
            header: EventHeader::for_fact("key", "BookFlight"),
            customer_email: "vip@example.com".to_string(),
            flight_id,
            passengers: vec!["A".to_string(), "B".to_string()],
            reference_id: VipBundleId::new(),
            idempotency_key: "key".to_string(),
        }
    }

    #[tokio::test]
    async fn test_booked_flight_reports_tickets() {
        let outbox = InMemoryStore::new();
        let handler =
            BookFlightHandler::new(Arc::new(InMemoryFlightService::new()), Arc::new(outbox.clone()));

        handler.book_flight(&command(FlightId::new())).await.unwrap();

        let records = outbox.pending_records().await;
        assert_eq!(records[0].message.topic, "events.FlightBooked");
        assert_eq!(
            records[0].message.payload["ticket_ids"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_rejected_flight_reports_failure() {
        let outbox = InMemoryStore::new();
        let flights = InMemoryFlightService::new();
        let flight_id = FlightId::new();
        flights.reject_flight(flight_id).await;
        let handler = BookFlightHandler::new(Arc::new(flights), Arc::new(outbox.clone()));

        handler.book_flight(&command(flight_id)).await.unwrap();

        let records = outbox.pending_records().await;
        assert_eq!(records[0].message.topic, "events.FlightBookingFailed");
    }

    #[tokio::test]
    async fn test_refused_cancellation_is_fatal() {
        let flights = InMemoryFlightService::new();
        flights.set_cancel_fault(Some(Fault::Reject)).await;
        let handler = CancelFlightTicketsHandler::new(Arc::new(flights));

        let err = handler
            .cancel_flight_tickets(&CancelFlightTickets {
                header: EventHeader::new(),
                flight_ticket_ids: vec![],
            })
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
