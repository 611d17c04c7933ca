//! Read models for the travel bundle saga.
//!
//! This crate maintains the ops booking view, a per-booking summary of
//! tickets, receipts, prints and refunds used by operations staff:
//! - [`Projection`] trait for folding events into a read model
//! - [`OpsBookingStore`] with in-memory and PostgreSQL implementations
//! - [`OpsBookingProjection`], idempotent per event id except for creation
//! - [`ProjectionHandler`] to run a projection behind the message router

pub mod error;
pub mod handler;
pub mod memory;
pub mod ops_bookings;
pub mod postgres;
pub mod projection;
pub mod read_model;
pub mod store;

pub use error::{ProjectionError, Result};
pub use handler::ProjectionHandler;
pub use memory::InMemoryOpsBookingStore;
pub use ops_bookings::OpsBookingProjection;
pub use postgres::PostgresOpsBookingStore;
pub use projection::{Applied, Projection};
pub use read_model::{OpsBooking, OpsTicket, TicketStatus};
pub use store::{Merge, OpsBookingStore};
