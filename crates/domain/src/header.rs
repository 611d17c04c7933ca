//! Event and command header.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata carried by every event and command.
///
/// `id` identifies one message instance. `idempotency_key` identifies the
/// business fact the message describes and stays the same across
/// re-deliveries and re-emissions of that fact, so consumers with side
/// effects (refunds, receipts) can collapse duplicates into one effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    pub id: EventId,
    pub published_at: DateTime<Utc>,
    pub idempotency_key: String,
}

impl EventHeader {
    /// Creates a header for a brand-new fact with a random idempotency key.
    pub fn new() -> Self {
        Self {
            id: EventId::new(),
            published_at: Utc::now(),
            idempotency_key: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a header for the fact identified by `idempotency_key`.
    ///
    /// The message id is derived from the key and `kind`, so emitting the
    /// same fact again yields the same id.
    pub fn for_fact(idempotency_key: impl Into<String>, kind: &str) -> Self {
        let idempotency_key = idempotency_key.into();
        Self {
            id: EventId::derive(&format!("{idempotency_key}:{kind}")),
            published_at: Utc::now(),
            idempotency_key,
        }
    }
}

impl Default for EventHeader {
    fn default() -> Self {
        Self::new()
    }
}
