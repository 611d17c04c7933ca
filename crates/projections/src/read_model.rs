//! Ops booking read model.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use common::{BookingId, EventId, Money, TicketId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a ticket in the ops view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    Confirmed,
    Refunded,
}

/// One ticket of an ops booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsTicket {
    pub ticket_id: TicketId,
    pub status: TicketStatus,
    pub price: Money,
    pub customer_email: String,
    pub confirmed_at: DateTime<Utc>,
    pub receipt_number: Option<String>,
    pub receipt_issued_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
    pub printed_file_name: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
}

/// A show booking as seen by operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpsBooking {
    pub booking_id: BookingId,
    pub booked_at: DateTime<Utc>,
    pub tickets: BTreeMap<TicketId, OpsTicket>,
    /// Events already merged into this row.
    pub applied_event_ids: BTreeSet<EventId>,
    pub last_update: DateTime<Utc>,
}

impl OpsBooking {
    /// Creates the booking from its creating event.
    pub fn new(booking_id: BookingId, booked_at: DateTime<Utc>, created_by: EventId) -> Self {
        Self {
            booking_id,
            booked_at,
            tickets: BTreeMap::new(),
            applied_event_ids: BTreeSet::from([created_by]),
            last_update: booked_at,
        }
    }

    /// Merges the effect of `event_id` unless it was merged before.
    ///
    /// Returns false for a duplicate, leaving the row untouched.
    pub fn apply(
        &mut self,
        event_id: EventId,
        at: DateTime<Utc>,
        merge: impl FnOnce(&mut Self),
    ) -> bool {
        if self.applied_event_ids.contains(&event_id) {
            return false;
        }
        merge(self);
        self.applied_event_ids.insert(event_id);
        self.last_update = self.last_update.max(at);
        true
    }

    pub fn ticket(&self, ticket_id: TicketId) -> Option<&OpsTicket> {
        self.tickets.get(&ticket_id)
    }

    pub fn ticket_mut(&mut self, ticket_id: TicketId) -> Option<&mut OpsTicket> {
        self.tickets.get_mut(&ticket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_event_is_not_merged() {
        let now = Utc::now();
        let mut booking = OpsBooking::new(BookingId::new(), now, EventId::new());
        let event_id = EventId::new();
        let mut merges = 0;

        assert!(booking.apply(event_id, now, |_| merges += 1));
        assert!(!booking.apply(event_id, now, |_| merges += 1));
        assert_eq!(merges, 1);
    }

    #[test]
    fn test_creating_event_counts_as_applied() {
        let created_by = EventId::new();
        let mut booking = OpsBooking::new(BookingId::new(), Utc::now(), created_by);
        assert!(!booking.apply(created_by, Utc::now(), |_| {}));
    }
}
