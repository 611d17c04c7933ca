//! Per-ticket side effects: receipts, printing and refunds.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{
    Event, EventHeader, MessageKind, RefundTicket, TicketBookingConfirmed, TicketPrinted,
    TicketReceiptIssued, TicketRefunded,
};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use store::OutboxStore;
use tracing::instrument;

use super::{decode, emit};
use crate::error::SagaError;
use crate::services::{IssueReceiptRequest, PaymentService, ReceiptService, TicketPrinter};

/// Issues a receipt for every confirmed ticket.
pub struct IssueReceiptHandler {
    receipts: Arc<dyn ReceiptService>,
    outbox: Arc<dyn OutboxStore>,
}

impl IssueReceiptHandler {
    /// Creates a new receipt handler.
    pub fn new(receipts: Arc<dyn ReceiptService>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { receipts, outbox }
    }

    #[instrument(skip_all, fields(ticket_id = %event.ticket_id))]
    pub async fn issue_receipt(
        &self,
        event: &TicketBookingConfirmed,
    ) -> crate::Result<HandlerOutcome> {
        let key = format!("ticket-{}-receipt", event.ticket_id);
        let receipt = self
            .receipts
            .issue_receipt(IssueReceiptRequest {
                ticket_id: event.ticket_id,
                price: event.price.clone(),
                idempotency_key: key.clone(),
            })
            .await
            .map_err(|e| SagaError::service("receipts", e))?;

        let issued = Event::TicketReceiptIssued(TicketReceiptIssued {
            header: EventHeader::for_fact(key, MessageKind::TicketReceiptIssued.as_str()),
            ticket_id: event.ticket_id,
            receipt_number: receipt.receipt_number,
            issued_at: receipt.issued_at,
        });
        emit(self.outbox.as_ref(), &[issued]).await
    }
}

#[async_trait]
impl MessageHandler for IssueReceiptHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let event: TicketBookingConfirmed = decode(message)?;
        Ok(self.issue_receipt(&event).await?)
    }
}

/// Prints every confirmed ticket.
pub struct PrintTicketHandler {
    printer: Arc<dyn TicketPrinter>,
    outbox: Arc<dyn OutboxStore>,
}

impl PrintTicketHandler {
    /// Creates a new print handler.
    pub fn new(printer: Arc<dyn TicketPrinter>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { printer, outbox }
    }

    #[instrument(skip_all, fields(ticket_id = %event.ticket_id))]
    pub async fn print_ticket(
        &self,
        event: &TicketBookingConfirmed,
    ) -> crate::Result<HandlerOutcome> {
        let file_name = self
            .printer
            .print_ticket(event.ticket_id, &event.customer_email, &event.price)
            .await
            .map_err(|e| SagaError::service("files", e))?;

        let printed = Event::TicketPrinted(TicketPrinted {
            header: EventHeader::for_fact(
                format!("ticket-{}-print", event.ticket_id),
                MessageKind::TicketPrinted.as_str(),
            ),
            ticket_id: event.ticket_id,
            file_name,
        });
        emit(self.outbox.as_ref(), &[printed]).await
    }
}

#[async_trait]
impl MessageHandler for PrintTicketHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let event: TicketBookingConfirmed = decode(message)?;
        Ok(self.print_ticket(&event).await?)
    }
}

/// Refunds a ticket: voids its receipt, returns the payment and reports the
/// refund.
pub struct RefundTicketHandler {
    receipts: Arc<dyn ReceiptService>,
    payments: Arc<dyn PaymentService>,
    outbox: Arc<dyn OutboxStore>,
}

impl RefundTicketHandler {
    /// Creates a new refund handler.
    pub fn new(
        receipts: Arc<dyn ReceiptService>,
        payments: Arc<dyn PaymentService>,
        outbox: Arc<dyn OutboxStore>,
    ) -> Self {
        Self {
            receipts,
            payments,
            outbox,
        }
    }

    #[instrument(skip_all, fields(ticket_id = %command.ticket_id))]
    pub async fn refund_ticket(&self, command: &RefundTicket) -> crate::Result<HandlerOutcome> {
        let key = &command.header.idempotency_key;

        self.receipts
            .void_receipt(command.ticket_id, &format!("{key}-void"))
            .await
            .map_err(|e| SagaError::service("receipts", e))?;
        self.payments
            .refund(command.ticket_id, key)
            .await
            .map_err(|e| SagaError::service("payments", e))?;

        let refunded = Event::TicketRefunded(TicketRefunded {
            header: EventHeader::for_fact(key.clone(), MessageKind::TicketRefunded.as_str()),
            ticket_id: command.ticket_id,
        });
        emit(self.outbox.as_ref(), &[refunded]).await
    }
}

#[async_trait]
impl MessageHandler for RefundTicketHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let command: RefundTicket = decode(message)?;
        Ok(self.refund_ticket(&command).await?)
    }
}
