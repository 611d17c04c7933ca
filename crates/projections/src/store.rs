//! Storage of the ops booking read model.

use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, TicketId};

use crate::{OpsBooking, Result};

/// A merge applied to one booking row. Returns true if it changed the row.
pub type Merge<'a> = &'a (dyn Fn(&mut OpsBooking) -> bool + Send + Sync);

/// Storage of ops bookings.
///
/// Updates are read-modify-write cycles run in one transaction; a merge may
/// run more than once if a concurrent writer forces a retry.
#[async_trait]
pub trait OpsBookingStore: Send + Sync {
    /// Stores a new booking. Fails with `AlreadyExists` if it exists.
    async fn create(&self, booking: OpsBooking) -> Result<()>;

    /// Applies `merge` to a booking and stores the result if it changed.
    ///
    /// Fails with `BookingNotFound` if the booking does not exist. Returns the
    /// booking after the merge and whether it changed.
    async fn update(&self, booking_id: BookingId, merge: Merge<'_>) -> Result<(OpsBooking, bool)>;

    /// Returns the booking holding `ticket_id`.
    async fn booking_id_for_ticket(&self, ticket_id: TicketId) -> Result<Option<BookingId>>;

    async fn get(&self, booking_id: BookingId) -> Result<Option<OpsBooking>>;

    /// Returns every booking, most recently booked first.
    async fn list(&self) -> Result<Vec<OpsBooking>>;
}

#[async_trait]
impl<T: OpsBookingStore + ?Sized> OpsBookingStore for Arc<T> {
    async fn create(&self, booking: OpsBooking) -> Result<()> {
        (**self).create(booking).await
    }

    async fn update(&self, booking_id: BookingId, merge: Merge<'_>) -> Result<(OpsBooking, bool)> {
        (**self).update(booking_id, merge).await
    }

    async fn booking_id_for_ticket(&self, ticket_id: TicketId) -> Result<Option<BookingId>> {
        (**self).booking_id_for_ticket(ticket_id).await
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<OpsBooking>> {
        (**self).get(booking_id).await
    }

    async fn list(&self) -> Result<Vec<OpsBooking>> {
        (**self).list().await
    }
}
