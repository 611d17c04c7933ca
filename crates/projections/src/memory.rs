use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, TicketId};
use tokio::sync::RwLock;

use crate::store::{Merge, OpsBookingStore};
use crate::{OpsBooking, ProjectionError, Result};

#[derive(Default)]
struct State {
    bookings: HashMap<BookingId, OpsBooking>,
    tickets: HashMap<TicketId, BookingId>,
}

/// In-memory ops booking store.
#[derive(Clone, Default)]
pub struct InMemoryOpsBookingStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOpsBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bookings.
    pub async fn count(&self) -> usize {
        self.state.read().await.bookings.len()
    }
}

#[async_trait]
impl OpsBookingStore for InMemoryOpsBookingStore {
    async fn create(&self, booking: OpsBooking) -> Result<()> {
        let mut state = self.state.write().await;
        if state.bookings.contains_key(&booking.booking_id) {
            return Err(ProjectionError::AlreadyExists(booking.booking_id));
        }
        for ticket_id in booking.tickets.keys() {
            state.tickets.insert(*ticket_id, booking.booking_id);
        }
        state.bookings.insert(booking.booking_id, booking);
        Ok(())
    }

    async fn update(&self, booking_id: BookingId, merge: Merge<'_>) -> Result<(OpsBooking, bool)> {
        let mut state = self.state.write().await;
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or(ProjectionError::BookingNotFound(booking_id))?;

        let changed = merge(booking);
        let updated = booking.clone();
        if changed {
            for ticket_id in updated.tickets.keys() {
                state.tickets.insert(*ticket_id, booking_id);
            }
        }
        Ok((updated, changed))
    }

    async fn booking_id_for_ticket(&self, ticket_id: TicketId) -> Result<Option<BookingId>> {
        Ok(self.state.read().await.tickets.get(&ticket_id).copied())
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<OpsBooking>> {
        Ok(self.state.read().await.bookings.get(&booking_id).cloned())
    }

    async fn list(&self) -> Result<Vec<OpsBooking>> {
        let mut bookings: Vec<_> = self.state.read().await.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(bookings)
    }
}
