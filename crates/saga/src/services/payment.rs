//! Payment service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::TicketId;
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

/// Trait for payment operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Refunds the payment for a ticket.
    ///
    /// A refund with an idempotency key that was already used has no effect.
    async fn refund(&self, ticket_id: TicketId, idempotency_key: &str)
    -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    refunds: HashMap<TicketId, u32>,
    seen_keys: HashSet<String>,
    fault: Option<Fault>,
}

/// In-memory payment service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentService {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentService {
    /// Creates a new in-memory payment service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on refunds.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    /// Returns how many times a ticket was refunded.
    pub async fn refund_count(&self, ticket_id: TicketId) -> u32 {
        self.state
            .read()
            .await
            .refunds
            .get(&ticket_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the total number of refunds made.
    pub async fn total_refunds(&self) -> u32 {
        self.state.read().await.refunds.values().sum()
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn refund(
        &self,
        ticket_id: TicketId,
        idempotency_key: &str,
    ) -> Result<(), ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "refund")?;

        if state.seen_keys.insert(idempotency_key.to_string()) {
            *state.refunds.entry(ticket_id).or_default() += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refund_deduplicates_on_key() {
        let service = InMemoryPaymentService::new();
        let ticket_id = TicketId::new();

        service.refund(ticket_id, "refund-1").await.unwrap();
        service.refund(ticket_id, "refund-1").await.unwrap();

        assert_eq!(service.refund_count(ticket_id).await, 1);
        assert_eq!(service.total_refunds().await, 1);
    }

    #[tokio::test]
    async fn test_fail_on_refund() {
        let service = InMemoryPaymentService::new();
        service.set_fault(Some(Fault::Unavailable)).await;

        let ticket_id = TicketId::new();
        let result = service.refund(ticket_id, "refund-1").await;
        assert!(matches!(result, Err(ServiceError::Unavailable(_))));
        assert_eq!(service.refund_count(ticket_id).await, 0);

        // A failed attempt must not burn the key.
        service.set_fault(None).await;
        service.refund(ticket_id, "refund-1").await.unwrap();
        assert_eq!(service.refund_count(ticket_id).await, 1);
    }
}
