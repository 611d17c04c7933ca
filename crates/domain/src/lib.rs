//! Domain layer for the VIP bundle saga.
//!
//! This crate provides:
//! - [`EventHeader`] carried by every message
//! - the closed [`Event`] and [`Command`] sum types
//! - [`MessageKind`] and the topic naming convention
//! - the [`VipBundle`] aggregate and its derived [`VipBundleStage`]

pub mod commands;
pub mod error;
pub mod events;
pub mod header;
pub mod stage;
pub mod topics;
pub mod vip_bundle;

pub use commands::{BookFlight, BookShowTickets, BookTaxi, CancelFlightTickets, Command, RefundTicket};
pub use error::VipBundleError;
pub use events::{
    BookingFailed, BookingMade, Event, FlightBooked, FlightBookingFailed, TaxiBooked,
    TaxiBookingFailed, TicketBookingConfirmed, TicketPrinted, TicketReceiptIssued,
    TicketRefunded, VipBundleFailed, VipBundleFinalized, VipBundleInitialized,
};
pub use header::EventHeader;
pub use stage::VipBundleStage;
pub use topics::{MessageKind, SERVICE_NAME, TopicCategory};
pub use vip_bundle::{FlightLeg, NewVipBundle, VipBundle};
