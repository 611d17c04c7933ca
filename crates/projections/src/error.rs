//! Projection error types.

use common::{BookingId, TicketId};
use thiserror::Error;

/// Errors that can occur during projection processing.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A booking was created twice.
    #[error("Ops booking {0} already exists")]
    AlreadyExists(BookingId),

    /// An update arrived before the booking was created.
    #[error("Ops booking {0} not found")]
    BookingNotFound(BookingId),

    /// A ticket event arrived before the ticket was confirmed.
    #[error("No ops booking holds ticket {0}")]
    TicketNotFound(TicketId),

    /// Another writer updated the booking concurrently.
    #[error("Concurrent update of ops booking {0}")]
    ConcurrencyConflict(BookingId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to (de)serialize a row or an event payload.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProjectionError {
    /// Returns true if the event may apply once earlier events have arrived
    /// or a concurrent writer has finished.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProjectionError::BookingNotFound(_)
                | ProjectionError::TicketNotFound(_)
                | ProjectionError::ConcurrencyConflict(_)
                | ProjectionError::Database(_)
        )
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
