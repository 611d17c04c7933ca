//! Show booking service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, Money, ShowId, TicketId};
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

/// A request to book tickets for a show.
#[derive(Debug, Clone)]
pub struct ShowBookingRequest {
    pub booking_id: BookingId,
    pub customer_email: String,
    pub number_of_tickets: u32,
    pub show_id: ShowId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookedTicket {
    pub ticket_id: TicketId,
    pub price: Money,
}

/// A confirmed show booking.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowBooking {
    pub booked_at: DateTime<Utc>,
    pub tickets: Vec<BookedTicket>,
}

/// Trait for show ticket bookings.
#[async_trait]
pub trait ShowBookingService: Send + Sync {
    /// Books the tickets of a booking.
    ///
    /// The booking id is the idempotency key: booking it again returns the
    /// original booking.
    async fn book_show_tickets(
        &self,
        request: ShowBookingRequest,
    ) -> Result<ShowBooking, ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryShowBookingState {
    bookings: HashMap<BookingId, ShowBooking>,
    seats_left: HashMap<ShowId, u32>,
    calls: u32,
    fault: Option<Fault>,
}

/// In-memory show booking service for testing.
///
/// Shows have unlimited seats unless a limit is set.
#[derive(Debug, Clone, Default)]
pub struct InMemoryShowBookingService {
    state: Arc<RwLock<InMemoryShowBookingState>>,
}

impl InMemoryShowBookingService {
    /// Creates a new service with no bookings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with `fault`.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    /// Limits the seats left for a show.
    pub async fn set_seats_left(&self, show_id: ShowId, seats: u32) {
        self.state.write().await.seats_left.insert(show_id, seats);
    }

    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    /// Returns how many requests reached the service.
    pub async fn calls(&self) -> u32 {
        self.state.read().await.calls
    }
}

#[async_trait]
impl ShowBookingService for InMemoryShowBookingService {
    async fn book_show_tickets(
        &self,
        request: ShowBookingRequest,
    ) -> Result<ShowBooking, ServiceError> {
        let mut state = self.state.write().await;
        state.calls += 1;
        Fault::check(state.fault, "show booking")?;

        if let Some(existing) = state.bookings.get(&request.booking_id) {
            return Ok(existing.clone());
        }

        if let Some(seats) = state.seats_left.get_mut(&request.show_id) {
            if *seats < request.number_of_tickets {
                return Err(ServiceError::Rejected(format!(
                    "only {seats} seats left for show {}",
                    request.show_id
                )));
            }
            *seats -= request.number_of_tickets;
        }

        let booking = ShowBooking {
            booked_at: Utc::now(),
            tickets: (0..request.number_of_tickets)
                .map(|_| BookedTicket {
                    ticket_id: TicketId::new(),
                    price: Money::new("150.00", "EUR"),
                })
                .collect(),
        };
        state.bookings.insert(request.booking_id, booking.clone());
        Ok(booking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(show_id: ShowId, tickets: u32) -> ShowBookingRequest {
        ShowBookingRequest {
            booking_id: BookingId::new(),
            customer_email: "vip@example.com".to_string(),
            number_of_tickets: tickets,
            show_id,
        }
    }

    #[tokio::test]
    async fn test_rebooking_returns_original_tickets() {
        let service = InMemoryShowBookingService::new();
        let request = request(ShowId::new(), 2);

        let first = service.book_show_tickets(request.clone()).await.unwrap();
        let second = service.book_show_tickets(request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.tickets.len(), 2);
        assert_eq!(service.booking_count().await, 1);
    }

    #[tokio::test]
    async fn test_sold_out_show_is_rejected() {
        let service = InMemoryShowBookingService::new();
        let show_id = ShowId::new();
        service.set_seats_left(show_id, 1).await;

        let result = service.book_show_tickets(request(show_id, 2)).await;
        assert!(matches!(result, Err(ServiceError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_unavailable() {
        let service = InMemoryShowBookingService::new();
        service.set_fault(Some(Fault::Unavailable)).await;

        let result = service.book_show_tickets(request(ShowId::new(), 1)).await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert_eq!(service.calls().await, 1);
    }
}
