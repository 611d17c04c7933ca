//! Domain events.

use chrono::{DateTime, Utc};
use common::{
    BookingId, FlightId, FlightTicketId, Money, ShowId, TaxiBookingId, TicketId, VipBundleId,
};
use serde::{Deserialize, Serialize};

use crate::header::EventHeader;
use crate::topics::MessageKind;

/// Every event known to the system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A VIP bundle was created and its saga should start.
    VipBundleInitialized(VipBundleInitialized),

    /// The show booking behind a bundle (or a plain booking) was made.
    BookingMade(BookingMade),

    /// One show ticket of a booking was confirmed.
    TicketBookingConfirmed(TicketBookingConfirmed),

    /// A receipt was issued for a ticket.
    TicketReceiptIssued(TicketReceiptIssued),

    /// A ticket file was printed.
    TicketPrinted(TicketPrinted),

    /// A ticket was refunded.
    TicketRefunded(TicketRefunded),

    /// The show booking was rejected.
    BookingFailed(BookingFailed),

    /// A flight leg was booked.
    FlightBooked(FlightBooked),

    /// A flight leg could not be booked.
    FlightBookingFailed(FlightBookingFailed),

    /// The taxi was booked.
    TaxiBooked(TaxiBooked),

    /// The taxi could not be booked.
    TaxiBookingFailed(TaxiBookingFailed),

    /// Every step of the bundle succeeded.
    VipBundleFinalized(VipBundleFinalized),

    /// The bundle failed and its compensations were issued.
    VipBundleFailed(VipBundleFailed),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipBundleInitialized {
    pub header: EventHeader,
    pub vip_bundle_id: VipBundleId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingMade {
    pub header: EventHeader,
    pub booking_id: BookingId,
    pub number_of_tickets: u32,
    pub customer_email: String,
    pub show_id: ShowId,
    pub booked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketBookingConfirmed {
    pub header: EventHeader,
    pub booking_id: BookingId,
    pub ticket_id: TicketId,
    pub customer_email: String,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketReceiptIssued {
    pub header: EventHeader,
    pub ticket_id: TicketId,
    pub receipt_number: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPrinted {
    pub header: EventHeader,
    pub ticket_id: TicketId,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRefunded {
    pub header: EventHeader,
    pub ticket_id: TicketId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingFailed {
    pub header: EventHeader,
    pub booking_id: BookingId,
    pub failure_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightBooked {
    pub header: EventHeader,
    pub flight_id: FlightId,
    pub ticket_ids: Vec<FlightTicketId>,
    pub reference_id: VipBundleId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightBookingFailed {
    pub header: EventHeader,
    pub flight_id: FlightId,
    pub reference_id: VipBundleId,
    pub failure_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiBooked {
    pub header: EventHeader,
    pub taxi_booking_id: TaxiBookingId,
    pub reference_id: VipBundleId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxiBookingFailed {
    pub header: EventHeader,
    pub reference_id: VipBundleId,
    pub failure_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipBundleFinalized {
    pub header: EventHeader,
    pub vip_bundle_id: VipBundleId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipBundleFailed {
    pub header: EventHeader,
    pub vip_bundle_id: VipBundleId,
    pub failure_reason: String,
}

impl Event {
    /// Returns the kind of this event.
    pub fn kind(&self) -> MessageKind {
        match self {
            Event::VipBundleInitialized(_) => MessageKind::VipBundleInitialized,
            Event::BookingMade(_) => MessageKind::BookingMade,
            Event::TicketBookingConfirmed(_) => MessageKind::TicketBookingConfirmed,
            Event::TicketReceiptIssued(_) => MessageKind::TicketReceiptIssued,
            Event::TicketPrinted(_) => MessageKind::TicketPrinted,
            Event::TicketRefunded(_) => MessageKind::TicketRefunded,
            Event::BookingFailed(_) => MessageKind::BookingFailed,
            Event::FlightBooked(_) => MessageKind::FlightBooked,
            Event::FlightBookingFailed(_) => MessageKind::FlightBookingFailed,
            Event::TaxiBooked(_) => MessageKind::TaxiBooked,
            Event::TaxiBookingFailed(_) => MessageKind::TaxiBookingFailed,
            Event::VipBundleFinalized(_) => MessageKind::VipBundleFinalized,
            Event::VipBundleFailed(_) => MessageKind::VipBundleFailed,
        }
    }

    /// Returns the header of this event.
    pub fn header(&self) -> &EventHeader {
        match self {
            Event::VipBundleInitialized(e) => &e.header,
            Event::BookingMade(e) => &e.header,
            Event::TicketBookingConfirmed(e) => &e.header,
            Event::TicketReceiptIssued(e) => &e.header,
            Event::TicketPrinted(e) => &e.header,
            Event::TicketRefunded(e) => &e.header,
            Event::BookingFailed(e) => &e.header,
            Event::FlightBooked(e) => &e.header,
            Event::FlightBookingFailed(e) => &e.header,
            Event::TaxiBooked(e) => &e.header,
            Event::TaxiBookingFailed(e) => &e.header,
            Event::VipBundleFinalized(e) => &e.header,
            Event::VipBundleFailed(e) => &e.header,
        }
    }

    /// Rebuilds an event from its kind and the variant body carried on the wire.
    pub fn from_payload(
        kind: MessageKind,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "type": kind.as_str(), "data": payload }))
    }

    /// Returns the key that keeps related events in order on the transport.
    ///
    /// Events of one saga share the VIP bundle id; booking and ticket events
    /// are keyed by what they carry.
    pub fn partition_key(&self) -> String {
        match self {
            Event::VipBundleInitialized(e) => e.vip_bundle_id.to_string(),
            Event::BookingMade(e) => e.booking_id.to_string(),
            Event::TicketBookingConfirmed(e) => e.booking_id.to_string(),
            Event::TicketReceiptIssued(e) => e.ticket_id.to_string(),
            Event::TicketPrinted(e) => e.ticket_id.to_string(),
            Event::TicketRefunded(e) => e.ticket_id.to_string(),
            Event::BookingFailed(e) => e.booking_id.to_string(),
            Event::FlightBooked(e) => e.reference_id.to_string(),
            Event::FlightBookingFailed(e) => e.reference_id.to_string(),
            Event::TaxiBooked(e) => e.reference_id.to_string(),
            Event::TaxiBookingFailed(e) => e.reference_id.to_string(),
            Event::VipBundleFinalized(e) => e.vip_bundle_id.to_string(),
            Event::VipBundleFailed(e) => e.vip_bundle_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_made() -> Event {
        Event::BookingMade(BookingMade {
            header: EventHeader::new(),
            booking_id: BookingId::new(),
            number_of_tickets: 2,
            customer_email: "vip@example.com".to_string(),
            show_id: ShowId::new(),
            booked_at: Utc::now(),
        })
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(booking_made().kind(), MessageKind::BookingMade);

        let failed = Event::TaxiBookingFailed(TaxiBookingFailed {
            header: EventHeader::new(),
            reference_id: VipBundleId::new(),
            failure_reason: "no cars".to_string(),
        });
        assert_eq!(failed.kind(), MessageKind::TaxiBookingFailed);
    }

    #[test]
    fn test_serialized_form_is_tagged() {
        let event = booking_made();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BookingMade");
        assert_eq!(json["data"]["number_of_tickets"], 2);
        assert!(json["data"]["header"]["idempotency_key"].is_string());

        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_rebuilds_from_wire_payload() {
        let event = booking_made();
        let json = serde_json::to_value(&event).unwrap();

        let back = Event::from_payload(MessageKind::BookingMade, json["data"].clone()).unwrap();
        assert_eq!(back, event);

        assert!(Event::from_payload(MessageKind::BookFlight, json["data"].clone()).is_err());
    }

    #[test]
    fn test_unknown_variant_is_rejected() {
        let json = serde_json::json!({"type": "SomethingElse", "data": {}});
        assert!(serde_json::from_value::<Event>(json).is_err());
    }

    #[test]
    fn test_flight_events_partition_by_reference() {
        let reference_id = VipBundleId::new();
        let event = Event::FlightBooked(FlightBooked {
            header: EventHeader::new(),
            flight_id: FlightId::new(),
            ticket_ids: vec![FlightTicketId::new()],
            reference_id,
        });
        assert_eq!(event.partition_key(), reference_id.to_string());
    }
}
