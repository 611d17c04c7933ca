//! Commands issued by the process manager.

use common::{BookingId, FlightId, FlightTicketId, ShowId, TicketId, VipBundleId};
use serde::{Deserialize, Serialize};

use crate::header::EventHeader;
use crate::topics::MessageKind;

/// Every command known to the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    BookShowTickets(BookShowTickets),
    BookFlight(BookFlight),
    BookTaxi(BookTaxi),
    CancelFlightTickets(CancelFlightTickets),
    RefundTicket(RefundTicket),
}

/// Books the show tickets of a booking.
///
/// The booking id doubles as the idempotency key towards the show booking
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookShowTickets {
    pub header: EventHeader,
    pub booking_id: BookingId,
    pub customer_email: String,
    pub number_of_tickets: u32,
    pub show_id: ShowId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookFlight {
    pub header: EventHeader,
    pub customer_email: String,
    pub flight_id: FlightId,
    pub passengers: Vec<String>,
    pub reference_id: VipBundleId,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTaxi {
    pub header: EventHeader,
    pub customer_email: String,
    pub customer_name: String,
    pub number_of_passengers: u32,
    pub reference_id: VipBundleId,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelFlightTickets {
    pub header: EventHeader,
    pub flight_ticket_ids: Vec<FlightTicketId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundTicket {
    pub header: EventHeader,
    pub ticket_id: TicketId,
}

impl Command {
    /// Returns the kind of this command.
    pub fn kind(&self) -> MessageKind {
        match self {
            Command::BookShowTickets(_) => MessageKind::BookShowTickets,
            Command::BookFlight(_) => MessageKind::BookFlight,
            Command::BookTaxi(_) => MessageKind::BookTaxi,
            Command::CancelFlightTickets(_) => MessageKind::CancelFlightTickets,
            Command::RefundTicket(_) => MessageKind::RefundTicket,
        }
    }

    /// Returns the header of this command.
    pub fn header(&self) -> &EventHeader {
        match self {
            Command::BookShowTickets(c) => &c.header,
            Command::BookFlight(c) => &c.header,
            Command::BookTaxi(c) => &c.header,
            Command::CancelFlightTickets(c) => &c.header,
            Command::RefundTicket(c) => &c.header,
        }
    }

    /// Rebuilds a command from its kind and the variant body carried on the wire.
    pub fn from_payload(
        kind: MessageKind,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "type": kind.as_str(), "data": payload }))
    }

    /// Returns the key that keeps related commands in order on the transport.
    pub fn partition_key(&self) -> String {
        match self {
            Command::BookShowTickets(c) => c.booking_id.to_string(),
            Command::BookFlight(c) => c.reference_id.to_string(),
            Command::BookTaxi(c) => c.reference_id.to_string(),
            Command::CancelFlightTickets(c) => c.header.idempotency_key.clone(),
            Command::RefundTicket(c) => c.ticket_id.to_string(),
        }
    }
}
