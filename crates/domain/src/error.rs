//! Domain error types.

use common::{FlightId, VipBundleId};
use thiserror::Error;

/// Errors raised by the VIP bundle aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VipBundleError {
    /// A required identifier was the nil UUID.
    #[error("{field} must not be empty")]
    MissingId { field: &'static str },

    /// The customer email was blank.
    #[error("customer email must not be empty")]
    EmptyCustomerEmail,

    /// The bundle asked for zero tickets.
    #[error("number of tickets must be positive")]
    NoTickets,

    /// Every ticket needs exactly one named passenger.
    #[error("expected {expected} passengers, got {actual}")]
    PassengerCountMismatch { expected: u32, actual: usize },

    /// Inbound and return legs cannot be the same flight.
    #[error("inbound and return flight must differ")]
    SameInboundAndReturnFlight,

    /// A flight event referenced a flight that is not part of the bundle.
    #[error("flight {flight_id} is not part of VIP bundle {vip_bundle_id}")]
    UnknownFlight {
        vip_bundle_id: VipBundleId,
        flight_id: FlightId,
    },

    /// More tickets were confirmed than the bundle booked.
    #[error("VIP bundle {vip_bundle_id} already holds all {expected} tickets")]
    TooManyTickets {
        vip_bundle_id: VipBundleId,
        expected: u32,
    },

    /// Not every booked ticket has been confirmed yet.
    #[error("VIP bundle {vip_bundle_id} expects {expected} confirmed tickets, has {actual}")]
    TicketsNotConfirmed {
        vip_bundle_id: VipBundleId,
        expected: u32,
        actual: usize,
    },
}

impl VipBundleError {
    /// Returns true if the error may resolve itself once more events arrive.
    ///
    /// Ticket confirmations are processed independently of the failure event
    /// that triggers compensation, so a count mismatch is expected to be
    /// temporary. Every other error is a broken invariant.
    pub fn is_eventually_consistent(&self) -> bool {
        matches!(self, VipBundleError::TicketsNotConfirmed { .. })
    }
}
