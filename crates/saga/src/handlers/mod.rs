//! Message handlers.
//!
//! Command handlers make one external call each and report the result as
//! events written to the outbox. Result events carry headers derived from
//! the command's idempotency key, so a redelivered command that is handled
//! again produces the same event ids and the outbox keeps one copy.

use domain::Event;
use messaging::{HandlerError, HandlerOutcome, Message};
use serde::de::DeserializeOwned;
use store::{OutboxMessage, OutboxStore};

pub mod flights;
pub mod process_manager;
pub mod show_booking;
pub mod taxi;
pub mod tickets;

pub use flights::{BookFlightHandler, CancelFlightTicketsHandler};
pub use process_manager::ProcessManagerHandler;
pub use show_booking::BookShowTicketsHandler;
pub use taxi::BookTaxiHandler;
pub use tickets::{IssueReceiptHandler, PrintTicketHandler, RefundTicketHandler};

pub(crate) fn decode<T: DeserializeOwned>(message: &Message) -> Result<T, HandlerError> {
    message
        .decode()
        .map_err(|e| HandlerError::undecodable(message, e))
}

/// Writes events to the outbox. Events already there are not written again.
pub(crate) async fn emit(
    outbox: &dyn OutboxStore,
    events: &[Event],
) -> crate::Result<HandlerOutcome> {
    let messages = events
        .iter()
        .map(OutboxMessage::event)
        .collect::<store::Result<Vec<_>>>()?;
    let written = outbox.append(messages).await?;

    Ok(if written == 0 {
        HandlerOutcome::Skipped
    } else {
        HandlerOutcome::Handled
    })
}
