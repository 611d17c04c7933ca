//! Message transport boundary.
//!
//! The transport delivers at least once: a message stays with its consumer
//! group until acknowledged, and a nack hands it out again.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{Delivery, Message, Result};

/// Publishes messages to topics.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `message` to `topic`. Returning `Ok` means the transport
    /// accepted the message.
    async fn publish(&self, topic: &str, message: Message) -> Result<()>;
}

/// Creates subscriptions for consumer groups.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Subscribes `group` to `topic`. Consumers sharing a group compete for
    /// messages; every group receives every message.
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Box<dyn Subscription>>;
}

/// A stream of deliveries for one consumer.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next delivery. Returns `None` once the transport closed.
    async fn next(&mut self) -> Option<Delivery>;

    /// Acknowledges a delivery; it will not be handed out again.
    async fn ack(&mut self, delivery: &Delivery) -> Result<()>;

    /// Rejects a delivery; it will be handed out again with the next attempt
    /// number.
    async fn nack(&mut self, delivery: Delivery) -> Result<()>;
}

#[async_trait]
impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        (**self).publish(topic, message).await
    }
}

#[async_trait]
impl<T: Subscriber + ?Sized> Subscriber for Arc<T> {
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Box<dyn Subscription>> {
        (**self).subscribe(topic, group).await
    }
}
