//! VIP bundle process manager.
//!
//! The process manager keeps no state of its own. Each incoming event is
//! turned into a pure decision over the current [`VipBundle`]: the next
//! state of the bundle plus the commands and events it causes. The decision
//! is committed through [`VipBundleRepository`], which writes the bundle and
//! its outbox messages atomically and re-runs the decision on conflicts.
//!
//! Every message a decision emits carries a header derived from the fact it
//! describes, so re-running a decision yields the same message ids and the
//! outbox stores each message once.

use common::VipBundleId;
use domain::{
    BookFlight, BookShowTickets, BookTaxi, BookingMade, CancelFlightTickets, Command, Event,
    EventHeader, FlightBooked, FlightLeg, MessageKind, RefundTicket, TaxiBooked,
    TicketBookingConfirmed, VipBundle, VipBundleFailed, VipBundleFinalized, VipBundleInitialized,
    VipBundleStage,
};
use store::{Change, OutboxMessage, SagaStore, UpdateOutcome, VipBundleRepository};
use tracing::{info, instrument, warn};

use crate::Result;

/// Drives VIP bundles from initialization to a terminal state.
#[derive(Clone)]
pub struct VipBundleProcessManager<S> {
    repository: VipBundleRepository<S>,
}

impl<S: SagaStore> VipBundleProcessManager<S> {
    /// Creates a new process manager over `repository`.
    pub fn new(repository: VipBundleRepository<S>) -> Self {
        Self { repository }
    }

    /// Returns the saga state repository.
    pub fn repository(&self) -> &VipBundleRepository<S> {
        &self.repository
    }

    /// Applies one event to the bundle it refers to.
    ///
    /// Returns `Skipped` when no bundle matches, which is how plain show
    /// bookings and stale deliveries are told apart from failures, and
    /// `Unchanged` when the bundle already reflects the event.
    #[instrument(skip(self, event), fields(kind = %event.kind(), event_id = %event.header().id))]
    pub async fn handle(&self, event: &Event) -> Result<UpdateOutcome> {
        let repo = &self.repository;
        let outcome = match event {
            Event::VipBundleInitialized(e) => {
                repo.update_by_id(e.vip_bundle_id, |b| on_initialized(b, e))
                    .await?
            }
            Event::BookingMade(e) => {
                repo.update_by_booking_id(e.booking_id, |b| on_booking_made(b, e))
                    .await?
            }
            Event::TicketBookingConfirmed(e) => {
                repo.update_by_booking_id(e.booking_id, |b| on_ticket_confirmed(b, e))
                    .await?
            }
            Event::FlightBooked(e) => {
                repo.update_by_id(e.reference_id, |b| on_flight_booked(b, e))
                    .await?
            }
            Event::TaxiBooked(e) => {
                repo.update_by_id(e.reference_id, |b| on_taxi_booked(b, e))
                    .await?
            }
            Event::BookingFailed(e) => {
                repo.update_by_booking_id(e.booking_id, |b| rollback(b, &e.failure_reason))
                    .await?
            }
            Event::FlightBookingFailed(e) => {
                repo.update_by_id(e.reference_id, |b| rollback(b, &e.failure_reason))
                    .await?
            }
            Event::TaxiBookingFailed(e) => {
                repo.update_by_id(e.reference_id, |b| rollback(b, &e.failure_reason))
                    .await?
            }
            Event::TicketReceiptIssued(_)
            | Event::TicketPrinted(_)
            | Event::TicketRefunded(_)
            | Event::VipBundleFinalized(_)
            | Event::VipBundleFailed(_) => UpdateOutcome::Skipped,
        };

        if let UpdateOutcome::Updated(bundle) = &outcome {
            record_transition(event.kind(), bundle);
        }
        Ok(outcome)
    }
}

/// Kinds of events the process manager reacts to.
pub const HANDLED_EVENTS: &[MessageKind] = &[
    MessageKind::VipBundleInitialized,
    MessageKind::BookingMade,
    MessageKind::TicketBookingConfirmed,
    MessageKind::FlightBooked,
    MessageKind::TaxiBooked,
    MessageKind::BookingFailed,
    MessageKind::FlightBookingFailed,
    MessageKind::TaxiBookingFailed,
];

fn record_transition(kind: MessageKind, bundle: &VipBundle) {
    let stage = bundle.stage();
    metrics::counter!(
        "saga_transitions_total",
        "event" => kind.as_str(),
        "stage" => stage.as_str()
    )
    .increment(1);

    match stage {
        VipBundleStage::Finalized => {
            metrics::counter!("saga_finalized_total").increment(1);
            info!(vip_bundle_id = %bundle.vip_bundle_id(), "VIP bundle finalized");
        }
        VipBundleStage::Failed => {
            metrics::counter!("saga_failed_total").increment(1);
            warn!(vip_bundle_id = %bundle.vip_bundle_id(), "VIP bundle failed, compensation issued");
        }
        _ => {}
    }
}

fn on_initialized(bundle: &VipBundle, event: &VipBundleInitialized) -> Result<Option<Change>> {
    let mut next = bundle.clone();
    if !next.mark_show_booking_requested(event.header.published_at) {
        return Ok(None);
    }

    let command = Command::BookShowTickets(BookShowTickets {
        header: EventHeader::for_fact(
            next.booking_id().to_string(),
            MessageKind::BookShowTickets.as_str(),
        ),
        booking_id: next.booking_id(),
        customer_email: next.customer_email().to_string(),
        number_of_tickets: next.number_of_tickets(),
        show_id: next.show_id(),
    });
    let outbox = vec![OutboxMessage::command(&command)?];
    Ok(Some(Change::new(next, outbox)))
}

fn on_booking_made(bundle: &VipBundle, event: &BookingMade) -> Result<Option<Change>> {
    let mut next = bundle.clone();
    if !next.record_booking_made(event.booked_at) {
        return Ok(None);
    }
    let outbox = vec![book_flight(&next, FlightLeg::Inbound)?];
    Ok(Some(Change::new(next, outbox)))
}

fn on_ticket_confirmed(
    bundle: &VipBundle,
    event: &TicketBookingConfirmed,
) -> Result<Option<Change>> {
    let mut next = bundle.clone();
    if !next.add_ticket(event.ticket_id)? {
        return Ok(None);
    }
    Ok(Some(Change::new(next, Vec::new())))
}

fn on_flight_booked(bundle: &VipBundle, event: &FlightBooked) -> Result<Option<Change>> {
    let leg = bundle.flight_leg(event.flight_id)?;

    let mut next = bundle.clone();
    if !next.record_flight_booked(leg, event.header.published_at, event.ticket_ids.clone()) {
        return Ok(None);
    }

    let mut outbox = Vec::new();
    match leg {
        FlightLeg::Inbound if !next.is_flight_booked(FlightLeg::Return) => {
            outbox.push(book_flight(&next, FlightLeg::Return)?);
        }
        FlightLeg::Return if next.is_flight_booked(FlightLeg::Inbound) => {
            outbox.push(book_taxi(&next)?);
        }
        _ => {}
    }
    Ok(Some(Change::new(next, outbox)))
}

fn on_taxi_booked(bundle: &VipBundle, event: &TaxiBooked) -> Result<Option<Change>> {
    let mut next = bundle.clone();
    if !next.record_taxi_booked(event.taxi_booking_id, event.header.published_at) {
        return Ok(None);
    }

    let finalized = Event::VipBundleFinalized(VipBundleFinalized {
        header: EventHeader::for_fact(
            vip_bundle_fact_key(next.vip_bundle_id(), "finalized"),
            MessageKind::VipBundleFinalized.as_str(),
        ),
        vip_bundle_id: next.vip_bundle_id(),
    });
    let outbox = vec![OutboxMessage::event(&finalized)?];
    Ok(Some(Change::new(next, outbox)))
}

/// Compensates every step the bundle has completed and marks it failed.
///
/// Runs at most once per bundle: a failed bundle is terminal, so later
/// failure events leave it unchanged. Waits (by failing transiently) until
/// every booked show ticket has been confirmed, so that none is left
/// unrefunded.
fn rollback(bundle: &VipBundle, reason: &str) -> Result<Option<Change>> {
    if bundle.is_terminal() {
        return Ok(None);
    }
    bundle.ensure_all_tickets_confirmed()?;

    let mut outbox = Vec::new();
    for ticket_id in bundle.ticket_ids() {
        let refund = Command::RefundTicket(RefundTicket {
            header: EventHeader::for_fact(
                format!("ticket-{ticket_id}-refund"),
                MessageKind::RefundTicket.as_str(),
            ),
            ticket_id: *ticket_id,
        });
        outbox.push(OutboxMessage::command(&refund)?);
    }

    for leg in [FlightLeg::Inbound, FlightLeg::Return] {
        let tickets = bundle.flight_ticket_ids(leg);
        if !bundle.is_flight_booked(leg) || tickets.is_empty() {
            continue;
        }
        let cancel = Command::CancelFlightTickets(CancelFlightTickets {
            header: EventHeader::for_fact(
                format!(
                    "vip-bundle-{}-flight-{}-cancel",
                    bundle.vip_bundle_id(),
                    bundle.flight_id(leg)
                ),
                MessageKind::CancelFlightTickets.as_str(),
            ),
            flight_ticket_ids: tickets.to_vec(),
        });
        outbox.push(OutboxMessage::command(&cancel)?);
    }

    let mut next = bundle.clone();
    next.mark_failed();

    let failed = Event::VipBundleFailed(VipBundleFailed {
        header: EventHeader::for_fact(
            vip_bundle_fact_key(next.vip_bundle_id(), "failed"),
            MessageKind::VipBundleFailed.as_str(),
        ),
        vip_bundle_id: next.vip_bundle_id(),
        failure_reason: reason.to_string(),
    });
    outbox.push(OutboxMessage::event(&failed)?);

    Ok(Some(Change::new(next, outbox)))
}

/// Idempotency key of a bundle-level fact such as `"initialized"`.
pub fn vip_bundle_fact_key(vip_bundle_id: VipBundleId, fact: &str) -> String {
    format!("vip-bundle-{vip_bundle_id}-{fact}")
}

/// Idempotency key of the booking of one flight of a bundle.
pub fn flight_booking_key(bundle: &VipBundle, leg: FlightLeg) -> String {
    format!(
        "vip-bundle-{}-flight-{}",
        bundle.vip_bundle_id(),
        bundle.flight_id(leg)
    )
}

fn book_flight(bundle: &VipBundle, leg: FlightLeg) -> Result<OutboxMessage> {
    let key = flight_booking_key(bundle, leg);
    let command = Command::BookFlight(BookFlight {
        header: EventHeader::for_fact(key.clone(), MessageKind::BookFlight.as_str()),
        customer_email: bundle.customer_email().to_string(),
        flight_id: bundle.flight_id(leg),
        passengers: bundle.passengers().to_vec(),
        reference_id: bundle.vip_bundle_id(),
        idempotency_key: key,
    });
    Ok(OutboxMessage::command(&command)?)
}

fn book_taxi(bundle: &VipBundle) -> Result<OutboxMessage> {
    let key = format!("vip-bundle-{}-taxi", bundle.vip_bundle_id());
    let command = Command::BookTaxi(BookTaxi {
        header: EventHeader::for_fact(key.clone(), MessageKind::BookTaxi.as_str()),
        customer_email: bundle.customer_email().to_string(),
        customer_name: bundle.passengers().first().cloned().unwrap_or_default(),
        number_of_passengers: bundle.number_of_tickets(),
        reference_id: bundle.vip_bundle_id(),
        idempotency_key: key,
    });
    Ok(OutboxMessage::command(&command)?)
}
