use store::StoreError;
use thiserror::Error;

/// Errors raised by the message transport and the outbox forwarder.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was shut down.
    #[error("Transport closed")]
    Closed,

    /// The transport refused a message.
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// Reading or writing the outbox failed.
    #[error("Outbox error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;
