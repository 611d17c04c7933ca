use std::collections::HashMap;

use common::EventId;
use serde::de::DeserializeOwned;
use store::{META_IDEMPOTENCY_KEY, META_NAME, OutboxMessage};

/// A message as carried by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique per logical message; re-publishing the same outbox record
    /// keeps the id, so consumers can use it for deduplication.
    pub id: EventId,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Creates a message without metadata.
    pub fn new(id: EventId, payload: serde_json::Value) -> Self {
        Self {
            id,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Decodes the payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Returns the message kind name, if the producer set one.
    pub fn name(&self) -> Option<&str> {
        self.metadata.get(META_NAME).map(String::as_str)
    }

    /// Returns the idempotency key, if the producer set one.
    pub fn idempotency_key(&self) -> Option<&str> {
        self.metadata.get(META_IDEMPOTENCY_KEY).map(String::as_str)
    }
}

impl From<&OutboxMessage> for Message {
    fn from(message: &OutboxMessage) -> Self {
        Self {
            id: message.event_id,
            payload: message.payload.clone(),
            metadata: message.metadata.clone(),
        }
    }
}

/// One delivery of a message to a consumer group.
///
/// `attempt` starts at 1 and grows with every redelivery after a nack.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub attempt: u32,
}

impl Delivery {
    /// Wraps a message for its first delivery.
    pub fn first(message: Message) -> Self {
        Self {
            message,
            attempt: 1,
        }
    }

    /// Returns the delivery that follows this one after a nack.
    pub fn redelivery(self) -> Self {
        Self {
            message: self.message,
            attempt: self.attempt + 1,
        }
    }
}
