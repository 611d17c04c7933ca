//! The VIP bundle saga.
//!
//! A VIP bundle books show tickets, an inbound and a return flight and a
//! taxi. [`VipBundleProcessManager`] reacts to events by updating the
//! bundle and writing the next command to the outbox in the same
//! transaction. Command handlers call the external services and report the
//! outcome as events. When a step fails, the process manager refunds every
//! ticket and cancels every booked flight before failing the bundle.
//!
//! [`RoutingTable`] wires all of it, plus the read-model projections, to a
//! [`messaging::Router`].

pub mod error;
pub mod handlers;
pub mod process_manager;
pub mod routing;
pub mod services;
pub mod vip_bundle_service;

pub use error::{Result, SagaError, ServiceError};
pub use handlers::{
    BookFlightHandler, BookShowTicketsHandler, BookTaxiHandler, CancelFlightTicketsHandler,
    IssueReceiptHandler, PrintTicketHandler, ProcessManagerHandler, RefundTicketHandler,
};
pub use process_manager::{
    HANDLED_EVENTS, VipBundleProcessManager, flight_booking_key, vip_bundle_fact_key,
};
pub use routing::{Route, RoutingTable};
pub use services::{ExternalServices, Fault, InMemoryServices};
pub use vip_bundle_service::{BookVipBundle, BookedVipBundle, VipBundleService};
