//! VIP bundle aggregate.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::{BookingId, FlightId, FlightTicketId, ShowId, TaxiBookingId, TicketId, VipBundleId};
use serde::{Deserialize, Serialize};

use crate::error::VipBundleError;
use crate::stage::VipBundleStage;

/// Parameters for creating a VIP bundle.
#[derive(Debug, Clone)]
pub struct NewVipBundle {
    pub vip_bundle_id: VipBundleId,
    pub booking_id: BookingId,
    pub customer_email: String,
    pub number_of_tickets: u32,
    pub show_id: ShowId,
    pub passengers: Vec<String>,
    pub inbound_flight_id: FlightId,
    pub return_flight_id: FlightId,
}

/// Which leg of the trip a flight belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightLeg {
    Inbound,
    Return,
}

/// State of one VIP bundle saga.
///
/// All mutators are no-ops once the bundle is terminal and report whether
/// they changed anything, so re-applying an already recorded fact is
/// detected rather than applied twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VipBundle {
    vip_bundle_id: VipBundleId,
    booking_id: BookingId,
    customer_email: String,
    number_of_tickets: u32,
    show_id: ShowId,
    passengers: Vec<String>,

    show_booking_requested_at: Option<DateTime<Utc>>,
    booking_made_at: Option<DateTime<Utc>>,
    ticket_ids: BTreeSet<TicketId>,

    inbound_flight_id: FlightId,
    inbound_flight_booked_at: Option<DateTime<Utc>>,
    inbound_flight_ticket_ids: Vec<FlightTicketId>,

    return_flight_id: FlightId,
    return_flight_booked_at: Option<DateTime<Utc>>,
    return_flight_ticket_ids: Vec<FlightTicketId>,

    taxi_booked_at: Option<DateTime<Utc>>,
    taxi_booking_id: Option<TaxiBookingId>,

    is_finalized: bool,
    failed: bool,
}

impl VipBundle {
    /// Creates a validated VIP bundle.
    pub fn new(params: NewVipBundle) -> Result<Self, VipBundleError> {
        if params.vip_bundle_id.is_nil() {
            return Err(VipBundleError::MissingId {
                field: "vip_bundle_id",
            });
        }
        if params.booking_id.is_nil() {
            return Err(VipBundleError::MissingId { field: "booking_id" });
        }
        if params.show_id.is_nil() {
            return Err(VipBundleError::MissingId { field: "show_id" });
        }
        if params.inbound_flight_id.is_nil() {
            return Err(VipBundleError::MissingId {
                field: "inbound_flight_id",
            });
        }
        if params.return_flight_id.is_nil() {
            return Err(VipBundleError::MissingId {
                field: "return_flight_id",
            });
        }
        if params.inbound_flight_id == params.return_flight_id {
            return Err(VipBundleError::SameInboundAndReturnFlight);
        }
        if params.customer_email.trim().is_empty() {
            return Err(VipBundleError::EmptyCustomerEmail);
        }
        if params.number_of_tickets == 0 {
            return Err(VipBundleError::NoTickets);
        }
        if params.passengers.len() != params.number_of_tickets as usize {
            return Err(VipBundleError::PassengerCountMismatch {
                expected: params.number_of_tickets,
                actual: params.passengers.len(),
            });
        }

        Ok(Self {
            vip_bundle_id: params.vip_bundle_id,
            booking_id: params.booking_id,
            customer_email: params.customer_email,
            number_of_tickets: params.number_of_tickets,
            show_id: params.show_id,
            passengers: params.passengers,
            show_booking_requested_at: None,
            booking_made_at: None,
            ticket_ids: BTreeSet::new(),
            inbound_flight_id: params.inbound_flight_id,
            inbound_flight_booked_at: None,
            inbound_flight_ticket_ids: Vec::new(),
            return_flight_id: params.return_flight_id,
            return_flight_booked_at: None,
            return_flight_ticket_ids: Vec::new(),
            taxi_booked_at: None,
            taxi_booking_id: None,
            is_finalized: false,
            failed: false,
        })
    }

    /// Returns the bundle ID.
    pub fn vip_bundle_id(&self) -> VipBundleId {
        self.vip_bundle_id
    }

    /// Returns the show booking ID.
    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    /// Returns the customer email.
    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    /// Returns the number of show tickets.
    pub fn number_of_tickets(&self) -> u32 {
        self.number_of_tickets
    }

    /// Returns the show ID.
    pub fn show_id(&self) -> ShowId {
        self.show_id
    }

    /// Returns the passenger names.
    pub fn passengers(&self) -> &[String] {
        &self.passengers
    }

    pub fn show_booking_requested_at(&self) -> Option<DateTime<Utc>> {
        self.show_booking_requested_at
    }

    /// Returns when the show booking was made.
    pub fn booking_made_at(&self) -> Option<DateTime<Utc>> {
        self.booking_made_at
    }

    /// Returns the confirmed show tickets.
    pub fn ticket_ids(&self) -> &BTreeSet<TicketId> {
        &self.ticket_ids
    }

    /// Returns the inbound flight ID.
    pub fn inbound_flight_id(&self) -> FlightId {
        self.inbound_flight_id
    }

    pub fn inbound_flight_booked_at(&self) -> Option<DateTime<Utc>> {
        self.inbound_flight_booked_at
    }

    pub fn inbound_flight_ticket_ids(&self) -> &[FlightTicketId] {
        &self.inbound_flight_ticket_ids
    }

    /// Returns the return flight ID.
    pub fn return_flight_id(&self) -> FlightId {
        self.return_flight_id
    }

    pub fn return_flight_booked_at(&self) -> Option<DateTime<Utc>> {
        self.return_flight_booked_at
    }

    pub fn return_flight_ticket_ids(&self) -> &[FlightTicketId] {
        &self.return_flight_ticket_ids
    }

    pub fn taxi_booked_at(&self) -> Option<DateTime<Utc>> {
        self.taxi_booked_at
    }

    /// Returns the taxi booking ID, once booked.
    pub fn taxi_booking_id(&self) -> Option<TaxiBookingId> {
        self.taxi_booking_id
    }

    /// Returns true if every step succeeded.
    pub fn is_finalized(&self) -> bool {
        self.is_finalized
    }

    /// Returns true if the bundle was rolled back.
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Returns true once the bundle is finalized or failed.
    pub fn is_terminal(&self) -> bool {
        self.is_finalized || self.failed
    }

    /// Derives the saga stage from the recorded facts.
    pub fn stage(&self) -> VipBundleStage {
        if self.failed {
            VipBundleStage::Failed
        } else if self.is_finalized {
            VipBundleStage::Finalized
        } else if self.return_flight_booked_at.is_some() {
            VipBundleStage::ReturnFlightBooked
        } else if self.inbound_flight_booked_at.is_some() {
            VipBundleStage::InboundFlightBooked
        } else if self.booking_made_at.is_some() {
            VipBundleStage::ShowBooked
        } else if self.show_booking_requested_at.is_some() {
            VipBundleStage::ShowBookingRequested
        } else {
            VipBundleStage::Initialized
        }
    }

    /// Returns the leg `flight_id` belongs to.
    pub fn flight_leg(&self, flight_id: FlightId) -> Result<FlightLeg, VipBundleError> {
        if flight_id == self.inbound_flight_id {
            Ok(FlightLeg::Inbound)
        } else if flight_id == self.return_flight_id {
            Ok(FlightLeg::Return)
        } else {
            Err(VipBundleError::UnknownFlight {
                vip_bundle_id: self.vip_bundle_id,
                flight_id,
            })
        }
    }

    /// Returns the flight id of a leg.
    pub fn flight_id(&self, leg: FlightLeg) -> FlightId {
        match leg {
            FlightLeg::Inbound => self.inbound_flight_id,
            FlightLeg::Return => self.return_flight_id,
        }
    }

    /// Returns true if the leg has been booked.
    pub fn is_flight_booked(&self, leg: FlightLeg) -> bool {
        match leg {
            FlightLeg::Inbound => self.inbound_flight_booked_at.is_some(),
            FlightLeg::Return => self.return_flight_booked_at.is_some(),
        }
    }

    /// Returns the tickets issued for a leg; empty until it is booked.
    pub fn flight_ticket_ids(&self, leg: FlightLeg) -> &[FlightTicketId] {
        match leg {
            FlightLeg::Inbound => &self.inbound_flight_ticket_ids,
            FlightLeg::Return => &self.return_flight_ticket_ids,
        }
    }

    /// Records that show tickets were requested.
    pub fn mark_show_booking_requested(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_terminal() || self.show_booking_requested_at.is_some() {
            return false;
        }
        self.show_booking_requested_at = Some(at);
        true
    }

    /// Records that the show booking was made.
    pub fn record_booking_made(&mut self, at: DateTime<Utc>) -> bool {
        if self.is_terminal() || self.booking_made_at.is_some() {
            return false;
        }
        self.booking_made_at = Some(at);
        // The booking can only be made after it was requested.
        self.show_booking_requested_at.get_or_insert(at);
        true
    }

    /// Adds a confirmed ticket.
    pub fn add_ticket(&mut self, ticket_id: TicketId) -> Result<bool, VipBundleError> {
        if self.is_terminal() || self.ticket_ids.contains(&ticket_id) {
            return Ok(false);
        }
        if self.ticket_ids.len() >= self.number_of_tickets as usize {
            return Err(VipBundleError::TooManyTickets {
                vip_bundle_id: self.vip_bundle_id,
                expected: self.number_of_tickets,
            });
        }
        self.ticket_ids.insert(ticket_id);
        Ok(true)
    }

    /// Records a booked flight leg.
    pub fn record_flight_booked(
        &mut self,
        leg: FlightLeg,
        at: DateTime<Utc>,
        ticket_ids: Vec<FlightTicketId>,
    ) -> bool {
        if self.is_terminal() || self.is_flight_booked(leg) {
            return false;
        }
        match leg {
            FlightLeg::Inbound => {
                self.inbound_flight_booked_at = Some(at);
                self.inbound_flight_ticket_ids = ticket_ids;
            }
            FlightLeg::Return => {
                self.return_flight_booked_at = Some(at);
                self.return_flight_ticket_ids = ticket_ids;
            }
        }
        true
    }

    /// Records the taxi booking, which finalizes the bundle.
    pub fn record_taxi_booked(
        &mut self,
        taxi_booking_id: TaxiBookingId,
        at: DateTime<Utc>,
    ) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.taxi_booking_id = Some(taxi_booking_id);
        self.taxi_booked_at = Some(at);
        self.is_finalized = true;
        true
    }

    /// Checks that every booked ticket has been confirmed.
    ///
    /// Compensation must refund every ticket, so it waits for this to hold
    /// once the show booking was made.
    pub fn ensure_all_tickets_confirmed(&self) -> Result<(), VipBundleError> {
        if self.booking_made_at.is_some()
            && self.ticket_ids.len() != self.number_of_tickets as usize
        {
            return Err(VipBundleError::TicketsNotConfirmed {
                vip_bundle_id: self.vip_bundle_id,
                expected: self.number_of_tickets,
                actual: self.ticket_ids.len(),
            });
        }
        Ok(())
    }

    /// Marks the bundle as failed.
    pub fn mark_failed(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.failed = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn params() -> NewVipBundle {
        NewVipBundle {
            vip_bundle_id: VipBundleId::new(),
            booking_id: BookingId::new(),
            customer_email: "vip@example.com".to_string(),
            number_of_tickets: 2,
            show_id: ShowId::new(),
            passengers: vec!["A".to_string(), "B".to_string()],
            inbound_flight_id: FlightId::new(),
            return_flight_id: FlightId::new(),
        }
    }

    fn bundle() -> VipBundle {
        VipBundle::new(params()).unwrap()
    }

    #[test]
    fn test_new_bundle_starts_initialized() {
        let bundle = bundle();
        assert_eq!(bundle.stage(), VipBundleStage::Initialized);
        assert!(!bundle.is_terminal());
        assert!(bundle.ticket_ids().is_empty());
    }

    #[test]
    fn test_validation_rejects_bad_input() {
        let mut p = params();
        p.vip_bundle_id = VipBundleId::from_uuid(Uuid::nil());
        assert_eq!(
            VipBundle::new(p).unwrap_err(),
            VipBundleError::MissingId {
                field: "vip_bundle_id"
            }
        );

        let mut p = params();
        p.number_of_tickets = 0;
        p.passengers.clear();
        assert_eq!(VipBundle::new(p).unwrap_err(), VipBundleError::NoTickets);

        let mut p = params();
        p.passengers.pop();
        assert_eq!(
            VipBundle::new(p).unwrap_err(),
            VipBundleError::PassengerCountMismatch {
                expected: 2,
                actual: 1
            }
        );

        let mut p = params();
        p.customer_email = "  ".to_string();
        assert_eq!(
            VipBundle::new(p).unwrap_err(),
            VipBundleError::EmptyCustomerEmail
        );

        let mut p = params();
        p.return_flight_id = p.inbound_flight_id;
        assert_eq!(
            VipBundle::new(p).unwrap_err(),
            VipBundleError::SameInboundAndReturnFlight
        );
    }

    #[test]
    fn test_stages_follow_recorded_facts() {
        let mut bundle = bundle();
        let now = Utc::now();

        assert!(bundle.mark_show_booking_requested(now));
        assert_eq!(bundle.stage(), VipBundleStage::ShowBookingRequested);

        assert!(bundle.record_booking_made(now));
        assert_eq!(bundle.stage(), VipBundleStage::ShowBooked);

        assert!(bundle.record_flight_booked(FlightLeg::Inbound, now, vec![FlightTicketId::new()]));
        assert_eq!(bundle.stage(), VipBundleStage::InboundFlightBooked);

        assert!(bundle.record_flight_booked(FlightLeg::Return, now, vec![FlightTicketId::new()]));
        assert_eq!(bundle.stage(), VipBundleStage::ReturnFlightBooked);

        assert!(bundle.record_taxi_booked(TaxiBookingId::new(), now));
        assert_eq!(bundle.stage(), VipBundleStage::Finalized);
        assert!(bundle.is_finalized());
        assert!(!bundle.failed());
    }

    #[test]
    fn test_repeated_facts_are_not_applied_twice() {
        let mut bundle = bundle();
        let now = Utc::now();

        assert!(bundle.record_booking_made(now));
        assert!(!bundle.record_booking_made(Utc::now()));
        assert_eq!(bundle.booking_made_at(), Some(now));

        let ticket = TicketId::new();
        assert!(bundle.add_ticket(ticket).unwrap());
        assert!(!bundle.add_ticket(ticket).unwrap());
        assert_eq!(bundle.ticket_ids().len(), 1);
    }

    #[test]
    fn test_too_many_tickets_is_an_error() {
        let mut bundle = bundle();
        bundle.add_ticket(TicketId::new()).unwrap();
        bundle.add_ticket(TicketId::new()).unwrap();
        assert!(matches!(
            bundle.add_ticket(TicketId::new()),
            Err(VipBundleError::TooManyTickets { expected: 2, .. })
        ));
    }

    #[test]
    fn test_unknown_flight_is_rejected() {
        let bundle = bundle();
        assert_eq!(
            bundle.flight_leg(bundle.inbound_flight_id()).unwrap(),
            FlightLeg::Inbound
        );
        assert_eq!(
            bundle.flight_leg(bundle.return_flight_id()).unwrap(),
            FlightLeg::Return
        );
        assert!(matches!(
            bundle.flight_leg(FlightId::new()),
            Err(VipBundleError::UnknownFlight { .. })
        ));
    }

    #[test]
    fn test_terminal_bundle_rejects_mutation() {
        let mut bundle = bundle();
        assert!(bundle.mark_failed());
        assert!(!bundle.mark_failed());
        assert!(!bundle.record_booking_made(Utc::now()));
        assert!(!bundle.record_taxi_booked(TaxiBookingId::new(), Utc::now()));
        assert!(!bundle.add_ticket(TicketId::new()).unwrap());
        assert!(bundle.failed());
        assert!(!bundle.is_finalized());
    }

    #[test]
    fn test_ticket_confirmation_check() {
        let mut bundle = bundle();
        // Nothing to check before the booking was made.
        assert!(bundle.ensure_all_tickets_confirmed().is_ok());

        bundle.record_booking_made(Utc::now());
        bundle.add_ticket(TicketId::new()).unwrap();
        let err = bundle.ensure_all_tickets_confirmed().unwrap_err();
        assert!(err.is_eventually_consistent());

        bundle.add_ticket(TicketId::new()).unwrap();
        assert!(bundle.ensure_all_tickets_confirmed().is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let mut bundle = bundle();
        bundle.record_booking_made(Utc::now());
        let json = serde_json::to_value(&bundle).unwrap();
        let back: VipBundle = serde_json::from_value(json).unwrap();
        assert_eq!(back, bundle);
    }
}
