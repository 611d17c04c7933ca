//! Receipt service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, TicketId};
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

#[derive(Debug, Clone)]
pub struct IssueReceiptRequest {
    pub ticket_id: TicketId,
    pub price: Money,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedReceipt {
    pub receipt_number: String,
    pub issued_at: DateTime<Utc>,
}

/// Trait for receipt operations.
#[async_trait]
pub trait ReceiptService: Send + Sync {
    /// Issues a receipt. Reusing the idempotency key returns the first receipt.
    async fn issue_receipt(
        &self,
        request: IssueReceiptRequest,
    ) -> Result<IssuedReceipt, ServiceError>;

    /// Voids the receipt of a ticket.
    ///
    /// A ticket whose receipt has not been issued yet fails with
    /// [`ServiceError::Unavailable`]; the void succeeds once it is issued.
    async fn void_receipt(&self, ticket_id: TicketId, idempotency_key: &str)
    -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryReceiptState {
    issued: HashMap<String, (TicketId, IssuedReceipt)>,
    voided: HashSet<TicketId>,
    next_number: u32,
    fault: Option<Fault>,
}

/// In-memory receipt service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReceiptService {
    state: Arc<RwLock<InMemoryReceiptState>>,
}

impl InMemoryReceiptService {
    /// Creates a new service with no receipts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with `fault`.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    pub async fn issued_count(&self) -> usize {
        self.state.read().await.issued.len()
    }

    pub async fn is_voided(&self, ticket_id: TicketId) -> bool {
        self.state.read().await.voided.contains(&ticket_id)
    }
}

#[async_trait]
impl ReceiptService for InMemoryReceiptService {
    async fn issue_receipt(
        &self,
        request: IssueReceiptRequest,
    ) -> Result<IssuedReceipt, ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "receipt")?;

        if let Some((_, receipt)) = state.issued.get(&request.idempotency_key) {
            return Ok(receipt.clone());
        }

        state.next_number += 1;
        let receipt = IssuedReceipt {
            receipt_number: format!("RCPT-{:06}", state.next_number),
            issued_at: Utc::now(),
        };
        state.issued.insert(
            request.idempotency_key,
            (request.ticket_id, receipt.clone()),
        );
        Ok(receipt)
    }

    async fn void_receipt(
        &self,
        ticket_id: TicketId,
        _idempotency_key: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "receipt voiding")?;
        if !state.issued.values().any(|(issued, _)| *issued == ticket_id) {
            return Err(ServiceError::Unavailable(format!(
                "no receipt issued for ticket {ticket_id} yet"
            )));
        }
        state.voided.insert(ticket_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> IssueReceiptRequest {
        IssueReceiptRequest {
            ticket_id: TicketId::new(),
            price: Money::new("150.00", "EUR"),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_issue_is_idempotent() {
        let service = InMemoryReceiptService::new();

        let first = service.issue_receipt(request("r1")).await.unwrap();
        let again = service.issue_receipt(request("r1")).await.unwrap();
        let other = service.issue_receipt(request("r2")).await.unwrap();

        assert_eq!(first, again);
        assert_eq!(first.receipt_number, "RCPT-000001");
        assert_eq!(other.receipt_number, "RCPT-000002");
        assert_eq!(service.issued_count().await, 2);
    }

    #[tokio::test]
    async fn test_void() {
        let service = InMemoryReceiptService::new();
        let request = request("r1");
        let ticket_id = request.ticket_id;

        let err = service.void_receipt(ticket_id, "void-1").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(!service.is_voided(ticket_id).await);

        service.issue_receipt(request).await.unwrap();
        service.void_receipt(ticket_id, "void-1").await.unwrap();
        assert!(service.is_voided(ticket_id).await);
    }
}
