//! External service traits and in-memory implementations.
//!
//! Each command handler makes one call through one of these traits. The
//! in-memory implementations deduplicate on the idempotency key they are
//! given and can be told to fail, either by rejecting requests or by being
//! unavailable.

use std::sync::Arc;

pub mod files;
pub mod flights;
pub mod payment;
pub mod receipts;
pub mod show_booking;
pub mod taxi;

pub use files::{InMemoryTicketPrinter, TicketPrinter};
pub use flights::{FlightBookingRequest, FlightService, InMemoryFlightService};
pub use payment::{InMemoryPaymentService, PaymentService};
pub use receipts::{InMemoryReceiptService, IssueReceiptRequest, IssuedReceipt, ReceiptService};
pub use show_booking::{
    BookedTicket, InMemoryShowBookingService, ShowBooking, ShowBookingRequest, ShowBookingService,
};
pub use taxi::{InMemoryTaxiService, TaxiBookingRequest, TaxiService};

use crate::error::ServiceError;

/// How an in-memory service misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse every request.
    Reject,
    /// Fail every request as if the service were down.
    Unavailable,
}

impl Fault {
    fn check(fault: Option<Fault>, what: &str) -> Result<(), ServiceError> {
        match fault {
            None => Ok(()),
            Some(Fault::Reject) => Err(ServiceError::Rejected(format!("{what} refused"))),
            Some(Fault::Unavailable) => {
                Err(ServiceError::Unavailable(format!("{what} not reachable")))
            }
        }
    }
}

/// Every external service the saga talks to.
#[derive(Clone)]
pub struct ExternalServices {
    pub shows: Arc<dyn ShowBookingService>,
    pub flights: Arc<dyn FlightService>,
    pub taxis: Arc<dyn TaxiService>,
    pub payments: Arc<dyn PaymentService>,
    pub receipts: Arc<dyn ReceiptService>,
    pub printer: Arc<dyn TicketPrinter>,
}

/// In-memory services, kept concrete so tests can inspect and steer them.
#[derive(Clone, Default)]
pub struct InMemoryServices {
    pub shows: InMemoryShowBookingService,
    pub flights: InMemoryFlightService,
    pub taxis: InMemoryTaxiService,
    pub payments: InMemoryPaymentService,
    pub receipts: InMemoryReceiptService,
    pub printer: InMemoryTicketPrinter,
}

impl InMemoryServices {
    /// Creates in-memory services that accept every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the services as trait objects for the handlers.
    pub fn external(&self) -> ExternalServices {
        ExternalServices {
            shows: Arc::new(self.shows.clone()),
            flights: Arc::new(self.flights.clone()),
            taxis: Arc::new(self.taxis.clone()),
            payments: Arc::new(self.payments.clone()),
            receipts: Arc::new(self.receipts.clone()),
            printer: Arc::new(self.printer.clone()),
        }
    }
}
