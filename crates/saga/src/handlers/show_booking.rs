use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    BookShowTickets, BookingFailed, BookingMade, Event, EventHeader, MessageKind,
    TicketBookingConfirmed,
};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use store::OutboxStore;
use tracing::{info, instrument};

use super::{decode, emit};
use crate::error::{SagaError, ServiceError};
use crate::services::{ShowBookingRequest, ShowBookingService};

/// Books show tickets and reports the booking with one event per ticket.
pub struct BookShowTicketsHandler {
    shows: Arc<dyn ShowBookingService>,
    outbox: Arc<dyn OutboxStore>,
}

impl BookShowTicketsHandler {
    /// Creates a new show booking handler.
    pub fn new(shows: Arc<dyn ShowBookingService>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { shows, outbox }
    }

    /// Books the show tickets and reports the booking and each ticket.
    #[instrument(skip_all, fields(booking_id = %command.booking_id))]
    pub async fn book_show_tickets(
        &self,
        command: &BookShowTickets,
    ) -> crate::Result<HandlerOutcome> {
        let booking_id = command.booking_id;
        let request = ShowBookingRequest {
            booking_id,
            customer_email: command.customer_email.clone(),
            number_of_tickets: command.number_of_tickets,
            show_id: command.show_id,
        };

        let events = match self.shows.book_show_tickets(request).await {
            Ok(booking) => {
                let mut events = vec![Event::BookingMade(BookingMade {
                    header: EventHeader::for_fact(
                        booking_id.to_string(),
                        MessageKind::BookingMade.as_str(),
                    ),
                    booking_id,
                    number_of_tickets: command.number_of_tickets,
                    customer_email: command.customer_email.clone(),
                    show_id: command.show_id,
                    booked_at: booking.booked_at,
                })];
                events.extend(booking.tickets.into_iter().map(|ticket| {
                    Event::TicketBookingConfirmed(TicketBookingConfirmed {
                        header: EventHeader::for_fact(
                            ticket.ticket_id.to_string(),
                            MessageKind::TicketBookingConfirmed.as_str(),
                        ),
                        booking_id,
                        ticket_id: ticket.ticket_id,
                        customer_email: command.customer_email.clone(),
                        price: ticket.price,
                    })
                }));
                events
            }
            Err(ServiceError::Rejected(reason)) => {
                info!(%reason, "Show booking rejected");
                vec![Event::BookingFailed(BookingFailed {
                    header: EventHeader::for_fact(
                        booking_id.to_string(),
                        MessageKind::BookingFailed.as_str(),
                    ),
                    booking_id,
                    failure_reason: reason,
                })]
            }
            Err(e) => return Err(SagaError::service("show booking", e)),
        };

        emit(self.outbox.as_ref(), &events).await
    }
}

#[async_trait]
impl MessageHandler for BookShowTicketsHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let command: BookShowTickets = decode(message)?;
        Ok(self.book_show_tickets(&command).await?)
    }
}

#[cfg(test)]
mod tests {
    use common::{BookingId, ShowId};
    use store::InMemoryStore;

    use super::*;
    use crate::services::{Fault, InMemoryShowBookingService};

    fn command() -> BookShowTickets {
        let booking_id = BookingId::new();
        BookShowTickets {
            header: EventHeader::for_fact(booking_id.to_string(), "BookShowTickets"),
            booking_id,
            customer_email: "vip@example.com".to_string(),
            number_of_tickets: 2,
            show_id: ShowId::new(),
        }
    }

    #[tokio::test]
    async fn test_redelivered_command_emits_once() {
        let outbox = InMemoryStore::new();
        let handler = BookShowTicketsHandler::new(
            Arc::new(InMemoryShowBookingService::new()),
            Arc::new(outbox.clone()),
        );
        let command = command();

        let first = handler.book_show_tickets(&command).await.unwrap();
        let again = handler.book_show_tickets(&command).await.unwrap();

        assert_eq!(first, HandlerOutcome::Handled);
        assert_eq!(again, HandlerOutcome::Skipped);
        let topics: Vec<_> = outbox
            .pending_records()
            .await
            .into_iter()
            .map(|r| r.message.topic)
            .collect();
        assert_eq!(
            topics,
            vec![
                "events.BookingMade",
                "events.TicketBookingConfirmed",
                "events.TicketBookingConfirmed"
            ]
        );
    }

    #[tokio::test]
    async fn test_rejection_becomes_booking_failed() {
        let outbox = InMemoryStore::new();
        let shows = InMemoryShowBookingService::new();
        shows.set_fault(Some(Fault::Reject)).await;
        let handler = BookShowTicketsHandler::new(Arc::new(shows), Arc::new(outbox.clone()));

        handler.book_show_tickets(&command()).await.unwrap();

        let records = outbox.pending_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message.topic, "events.BookingFailed");
    }

    #[tokio::test]
    async fn test_unavailable_service_is_retried() {
        let outbox = InMemoryStore::new();
        let shows = InMemoryShowBookingService::new();
        shows.set_fault(Some(Fault::Unavailable)).await;
        let handler = BookShowTicketsHandler::new(Arc::new(shows), Arc::new(outbox.clone()));

        let err = handler.book_show_tickets(&command()).await.unwrap_err();
        assert!(err.is_transient());
        assert!(outbox.pending_records().await.is_empty());
    }
}
