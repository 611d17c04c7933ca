//! Ticket file printing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, TicketId};
use tokio::sync::RwLock;

use super::Fault;
use crate::error::ServiceError;

/// Trait for storing printable ticket files.
#[async_trait]
pub trait TicketPrinter: Send + Sync {
    /// Stores the printable file of a ticket and returns its name.
    ///
    /// Printing a ticket again overwrites the same file.
    async fn print_ticket(
        &self,
        ticket_id: TicketId,
        customer_email: &str,
        price: &Money,
    ) -> Result<String, ServiceError>;
}

/// Returns the file name of a printed ticket.
pub fn ticket_file_name(ticket_id: TicketId) -> String {
    format!("{ticket_id}-ticket.html")
}

#[derive(Debug, Default)]
struct InMemoryFiles {
    files: HashMap<String, String>,
    fault: Option<Fault>,
}

/// In-memory file store for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketPrinter {
    state: Arc<RwLock<InMemoryFiles>>,
}

impl InMemoryTicketPrinter {
    /// Creates a new printer with no files.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with `fault`.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        self.state.write().await.fault = fault;
    }

    pub async fn file(&self, name: &str) -> Option<String> {
        self.state.read().await.files.get(name).cloned()
    }

    pub async fn file_count(&self) -> usize {
        self.state.read().await.files.len()
    }
}

#[async_trait]
impl TicketPrinter for InMemoryTicketPrinter {
    async fn print_ticket(
        &self,
        ticket_id: TicketId,
        customer_email: &str,
        price: &Money,
    ) -> Result<String, ServiceError> {
        let mut state = self.state.write().await;
        Fault::check(state.fault, "file storage")?;

        let name = ticket_file_name(ticket_id);
        let body = format!(
            "<html><body><h1>Ticket {ticket_id}</h1><p>Customer: {customer_email}</p><p>Price: {price}</p></body></html>"
        );
        state.files.insert(name.clone(), body);
        Ok(name)
    }
}
