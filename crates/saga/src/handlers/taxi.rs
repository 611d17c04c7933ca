use std::sync::Arc;

use async_trait::async_trait;
use domain::{BookTaxi, Event, EventHeader, MessageKind, TaxiBooked, TaxiBookingFailed};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use store::OutboxStore;
use tracing::{info, instrument};

use super::{decode, emit};
use crate::error::{SagaError, ServiceError};
use crate::services::{TaxiBookingRequest, TaxiService};

/// Books the taxi of a bundle.
pub struct BookTaxiHandler {
    taxis: Arc<dyn TaxiService>,
    outbox: Arc<dyn OutboxStore>,
}

impl BookTaxiHandler {
    /// Creates a new taxi booking handler.
    pub fn new(taxis: Arc<dyn TaxiService>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { taxis, outbox }
    }

    /// Books the taxi and reports the outcome.
    #[instrument(skip_all, fields(reference_id = %command.reference_id))]
    pub async fn book_taxi(&self, command: &BookTaxi) -> crate::Result<HandlerOutcome> {
        let request = TaxiBookingRequest {
            customer_email: command.customer_email.clone(),
            customer_name: command.customer_name.clone(),
            number_of_passengers: command.number_of_passengers,
            reference_id: command.reference_id,
            idempotency_key: command.idempotency_key.clone(),
        };

        let event = match self.taxis.book_taxi(request).await {
            Ok(taxi_booking_id) => Event::TaxiBooked(TaxiBooked {
                header: EventHeader::for_fact(
                    command.idempotency_key.clone(),
                    MessageKind::TaxiBooked.as_str(),
                ),
                taxi_booking_id,
                reference_id: command.reference_id,
            }),
            Err(ServiceError::Rejected(reason)) => {
                info!(%reason, "Taxi booking rejected");
                Event::TaxiBookingFailed(TaxiBookingFailed {
                    header: EventHeader::for_fact(
                        command.idempotency_key.clone(),
                        MessageKind::TaxiBookingFailed.as_str(),
                    ),
                    reference_id: command.reference_id,
                    failure_reason: reason,
                })
            }
            Err(e) => return Err(SagaError::service("taxi", e)),
        };

        emit(self.outbox.as_ref(), &[event]).await
    }
}

#[async_trait]
impl MessageHandler for BookTaxiHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let command: BookTaxi = decode(message)?;
        Ok(self.book_taxi(&command).await?)
    }
}
