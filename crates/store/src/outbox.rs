use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::EventId;
use domain::{Command, Event, EventHeader, MessageKind};
use serde::Serialize;

use crate::{Result, StoreError};

/// Metadata key carrying the message kind name.
pub const META_NAME: &str = "name";
/// Metadata key carrying the header's idempotency key.
pub const META_IDEMPOTENCY_KEY: &str = "idempotency_key";
/// Metadata key carrying the header's publication time (RFC 3339).
pub const META_PUBLISHED_AT: &str = "published_at";
/// Metadata key carrying the partition key.
pub const META_PARTITION_KEY: &str = "partition_key";

/// A message waiting to be written to the outbox.
///
/// `event_id` is unique across the outbox; writing a message whose id is
/// already present is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub event_id: EventId,
    pub topic: String,
    pub payload: serde_json::Value,
    pub metadata: HashMap<String, String>,
    pub partition_key: String,
}

impl OutboxMessage {
    /// Builds the outbox message for an event.
    pub fn event(event: &Event) -> Result<Self> {
        Self::build(event, event.kind(), event.header(), event.partition_key())
    }

    /// Builds the outbox message for a command.
    pub fn command(command: &Command) -> Result<Self> {
        Self::build(
            command,
            command.kind(),
            command.header(),
            command.partition_key(),
        )
    }

    // Messages are tagged enums; the wire payload is the variant body only,
    // the variant name travels in the metadata and the topic.
    fn build<T: Serialize>(
        message: &T,
        kind: MessageKind,
        header: &EventHeader,
        partition_key: String,
    ) -> Result<Self> {
        let mut tagged = serde_json::to_value(message)?;
        let payload = tagged
            .get_mut("data")
            .map(serde_json::Value::take)
            .ok_or_else(|| {
                StoreError::Serialization(serde::ser::Error::custom(format!(
                    "{kind} did not serialize as a tagged message"
                )))
            })?;

        let metadata = HashMap::from([
            (META_NAME.to_string(), kind.as_str().to_string()),
            (
                META_IDEMPOTENCY_KEY.to_string(),
                header.idempotency_key.clone(),
            ),
            (
                META_PUBLISHED_AT.to_string(),
                header.published_at.to_rfc3339(),
            ),
            (META_PARTITION_KEY.to_string(), partition_key.clone()),
        ]);

        Ok(Self {
            event_id: header.id,
            topic: kind.topic(),
            payload,
            metadata,
            partition_key,
        })
    }
}

/// A message stored in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxRecord {
    /// Insertion position; records are forwarded in this order.
    pub position: i64,
    pub message: OutboxMessage,
    pub created_at: DateTime<Utc>,
    pub forwarded_at: Option<DateTime<Utc>>,
}

/// Durable storage of messages awaiting forwarding.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Appends messages outside of any aggregate update.
    ///
    /// Messages whose `event_id` is already stored are skipped. Returns the
    /// number of newly stored messages.
    async fn append(&self, messages: Vec<OutboxMessage>) -> Result<usize>;

    /// Returns up to `limit` not yet forwarded records in insertion order.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>>;

    /// Marks records as forwarded. Unknown ids are ignored.
    async fn mark_forwarded(&self, event_ids: &[EventId]) -> Result<()>;

    /// Returns the number of records not yet forwarded.
    async fn pending_count(&self) -> Result<u64>;
}

#[async_trait]
impl<T: OutboxStore + ?Sized> OutboxStore for Arc<T> {
    async fn append(&self, messages: Vec<OutboxMessage>) -> Result<usize> {
        (**self).append(messages).await
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        (**self).fetch_pending(limit).await
    }

    async fn mark_forwarded(&self, event_ids: &[EventId]) -> Result<()> {
        (**self).mark_forwarded(event_ids).await
    }

    async fn pending_count(&self) -> Result<u64> {
        (**self).pending_count().await
    }
}
