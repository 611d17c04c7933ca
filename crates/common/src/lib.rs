//! Shared identifier and value types.

mod types;

pub use types::{
    BookingId, EventId, FlightId, FlightTicketId, Money, ShowId, TaxiBookingId, TicketId,
    VipBundleId,
};
