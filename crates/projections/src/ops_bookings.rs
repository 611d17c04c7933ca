//! Ops booking projection.
//!
//! `BookingMade` creates the row and must happen once: a second delivery is
//! rejected with `AlreadyExists`. Every other event is merged into the row
//! keyed by its event id, so re-delivery is a no-op.

use async_trait::async_trait;
use common::{BookingId, TicketId};
use domain::{
    BookingMade, Event, MessageKind, TicketBookingConfirmed, TicketPrinted, TicketReceiptIssued,
    TicketRefunded,
};
use tracing::{debug, instrument};

use crate::projection::{Applied, Projection};
use crate::store::OpsBookingStore;
use crate::{OpsBooking, OpsTicket, ProjectionError, Result, TicketStatus};

const KINDS: &[MessageKind] = &[
    MessageKind::BookingMade,
    MessageKind::TicketBookingConfirmed,
    MessageKind::TicketReceiptIssued,
    MessageKind::TicketPrinted,
    MessageKind::TicketRefunded,
];

/// Maintains the ops booking read model.
#[derive(Clone)]
pub struct OpsBookingProjection<S> {
    store: S,
}

impl<S: OpsBookingStore> OpsBookingProjection<S> {
    /// Creates a new projection writing to `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the read model store.
    pub fn store(&self) -> &S {
        &self.store
    }

    #[instrument(skip(self, event), fields(booking_id = %event.booking_id))]
    async fn booking_made(&self, event: &BookingMade) -> Result<Applied> {
        let booking = OpsBooking::new(event.booking_id, event.booked_at, event.header.id);
        self.store.create(booking).await?;
        Ok(Applied::Changed)
    }

    #[instrument(skip(self, event), fields(booking_id = %event.booking_id, ticket_id = %event.ticket_id))]
    async fn ticket_confirmed(&self, event: &TicketBookingConfirmed) -> Result<Applied> {
        let merge = |booking: &mut OpsBooking| {
            booking.apply(event.header.id, event.header.published_at, |b| {
                b.tickets.entry(event.ticket_id).or_insert_with(|| OpsTicket {
                    ticket_id: event.ticket_id,
                    status: TicketStatus::Confirmed,
                    price: event.price.clone(),
                    customer_email: event.customer_email.clone(),
                    confirmed_at: event.header.published_at,
                    receipt_number: None,
                    receipt_issued_at: None,
                    printed_at: None,
                    printed_file_name: None,
                    refunded_at: None,
                });
            })
        };
        self.merge(event.booking_id, &merge).await
    }

    async fn receipt_issued(&self, event: &TicketReceiptIssued) -> Result<Applied> {
        self.merge_ticket(event.ticket_id, event.header.id, event.header.published_at, |t| {
            t.receipt_number = Some(event.receipt_number.clone());
            t.receipt_issued_at = Some(event.issued_at);
        })
        .await
    }

    async fn ticket_printed(&self, event: &TicketPrinted) -> Result<Applied> {
        self.merge_ticket(event.ticket_id, event.header.id, event.header.published_at, |t| {
            t.printed_at = Some(event.header.published_at);
            t.printed_file_name = Some(event.file_name.clone());
        })
        .await
    }

    async fn ticket_refunded(&self, event: &TicketRefunded) -> Result<Applied> {
        self.merge_ticket(event.ticket_id, event.header.id, event.header.published_at, |t| {
            t.status = TicketStatus::Refunded;
            t.refunded_at = Some(event.header.published_at);
        })
        .await
    }

    #[instrument(skip(self, event_id, at, update))]
    async fn merge_ticket<F>(
        &self,
        ticket_id: TicketId,
        event_id: common::EventId,
        at: chrono::DateTime<chrono::Utc>,
        update: F,
    ) -> Result<Applied>
    where
        F: Fn(&mut OpsTicket) + Send + Sync,
    {
        let booking_id = self
            .store
            .booking_id_for_ticket(ticket_id)
            .await?
            .ok_or(ProjectionError::TicketNotFound(ticket_id))?;

        let merge = |booking: &mut OpsBooking| {
            booking.apply(event_id, at, |b| {
                if let Some(ticket) = b.ticket_mut(ticket_id) {
                    update(ticket);
                }
            })
        };
        self.merge(booking_id, &merge).await
    }

    async fn merge(
        &self,
        booking_id: BookingId,
        merge: &(dyn Fn(&mut OpsBooking) -> bool + Send + Sync),
    ) -> Result<Applied> {
        let (_, changed) = self.store.update(booking_id, merge).await?;
        if !changed {
            debug!(%booking_id, "Event already applied");
        }
        Ok(if changed {
            Applied::Changed
        } else {
            Applied::Unchanged
        })
    }
}

#[async_trait]
impl<S: OpsBookingStore> Projection for OpsBookingProjection<S> {
    fn name(&self) -> &'static str {
        "OpsBookingProjection"
    }

    fn kinds(&self) -> &'static [MessageKind] {
        KINDS
    }

    async fn handle(&self, event: &Event) -> Result<Applied> {
        let applied = match event {
            Event::BookingMade(e) => self.booking_made(e).await?,
            Event::TicketBookingConfirmed(e) => self.ticket_confirmed(e).await?,
            Event::TicketReceiptIssued(e) => self.receipt_issued(e).await?,
            Event::TicketPrinted(e) => self.ticket_printed(e).await?,
            Event::TicketRefunded(e) => self.ticket_refunded(e).await?,
            _ => Applied::Unchanged,
        };

        if applied == Applied::Changed {
            metrics::counter!("projection_events_applied_total", "event" => event.kind().as_str())
                .increment(1);
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::{Money, ShowId};
    use domain::EventHeader;

    use super::*;
    use crate::InMemoryOpsBookingStore;

    fn booking_made(booking_id: BookingId) -> Event {
        Event::BookingMade(BookingMade {
            header: EventHeader::new(),
            booking_id,
            number_of_tickets: 1,
            customer_email: "vip@example.com".to_string(),
            show_id: ShowId::new(),
            booked_at: Utc::now(),
        })
    }

    fn ticket_confirmed(booking_id: BookingId, ticket_id: TicketId) -> Event {
        Event::TicketBookingConfirmed(TicketBookingConfirmed {
            header: EventHeader::new(),
            booking_id,
            ticket_id,
            customer_email: "vip@example.com".to_string(),
            price: Money::new("120.00", "EUR"),
        })
    }

    #[tokio::test]
    async fn test_booking_made_creates_once() {
        let projection = OpsBookingProjection::new(InMemoryOpsBookingStore::new());
        let booking_id = BookingId::new();
        let event = booking_made(booking_id);

        assert_eq!(projection.handle(&event).await.unwrap(), Applied::Changed);
        assert!(matches!(
            projection.handle(&event).await,
            Err(ProjectionError::AlreadyExists(id)) if id == booking_id
        ));
    }

    #[tokio::test]
    async fn test_ticket_before_booking_is_retryable() {
        let projection = OpsBookingProjection::new(InMemoryOpsBookingStore::new());
        let err = projection
            .handle(&ticket_confirmed(BookingId::new(), TicketId::new()))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_refund_marks_ticket_refunded() {
        let store = InMemoryOpsBookingStore::new();
        let projection = OpsBookingProjection::new(store.clone());
        let booking_id = BookingId::new();
        let ticket_id = TicketId::new();

        projection.handle(&booking_made(booking_id)).await.unwrap();
        projection
            .handle(&ticket_confirmed(booking_id, ticket_id))
            .await
            .unwrap();
        projection
            .handle(&Event::TicketRefunded(TicketRefunded {
                header: EventHeader::new(),
                ticket_id,
            }))
            .await
            .unwrap();

        let booking = store.get(booking_id).await.unwrap().unwrap();
        let ticket = booking.ticket(ticket_id).unwrap();
        assert_eq!(ticket.status, TicketStatus::Refunded);
        assert!(ticket.refunded_at.is_some());
    }

    #[tokio::test]
    async fn test_unrelated_events_are_ignored() {
        let projection = OpsBookingProjection::new(InMemoryOpsBookingStore::new());
        let event = Event::VipBundleFinalized(domain::VipBundleFinalized {
            header: EventHeader::new(),
            vip_bundle_id: common::VipBundleId::new(),
        });
        assert_eq!(projection.handle(&event).await.unwrap(), Applied::Unchanged);
    }
}
