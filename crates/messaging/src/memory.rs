use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock, mpsc};

use crate::{
    Delivery, Message, Publisher, Result, Subscriber, Subscription, TransportError,
};

type Queue = Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>;

struct Group {
    sender: mpsc::UnboundedSender<Delivery>,
    queue: Queue,
}

#[derive(Default)]
struct BusState {
    groups: HashMap<String, HashMap<String, Group>>,
    published: HashMap<String, Vec<Message>>,
    closed: bool,
}

/// In-memory pub/sub bus with consumer groups.
///
/// Every consumer group of a topic gets its own queue; consumers in one
/// group compete for its messages. Messages published before any group
/// subscribed are only recorded in the publish log.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<RwLock<BusState>>,
}

impl InMemoryBus {
    /// Creates a new empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every message published to `topic`, in publish order.
    pub async fn published(&self, topic: &str) -> Vec<Message> {
        self.state
            .read()
            .await
            .published
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the topics that have seen at least one message.
    pub async fn topics(&self) -> Vec<String> {
        let mut topics: Vec<_> = self.state.read().await.published.keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Stops accepting messages and ends all subscriptions.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        state.closed = true;
        state.groups.clear();
    }
}

#[async_trait]
impl Publisher for InMemoryBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<()> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        if let Some(groups) = state.groups.get(topic) {
            for (group, queue) in groups {
                queue
                    .sender
                    .send(Delivery::first(message.clone()))
                    .map_err(|_| TransportError::Publish {
                        topic: topic.to_string(),
                        reason: format!("consumer group {group} is gone"),
                    })?;
            }
        }

        state
            .published
            .entry(topic.to_string())
            .or_default()
            .push(message);
        Ok(())
    }
}

#[async_trait]
impl Subscriber for InMemoryBus {
    async fn subscribe(&self, topic: &str, group: &str) -> Result<Box<dyn Subscription>> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(TransportError::Closed);
        }

        let group = state
            .groups
            .entry(topic.to_string())
            .or_default()
            .entry(group.to_string())
            .or_insert_with(|| {
                let (sender, receiver) = mpsc::unbounded_channel();
                Group {
                    sender,
                    queue: Arc::new(Mutex::new(receiver)),
                }
            });

        Ok(Box::new(InMemorySubscription {
            queue: group.queue.clone(),
            requeue: group.sender.downgrade(),
        }))
    }
}

struct InMemorySubscription {
    queue: Queue,
    requeue: mpsc::WeakUnboundedSender<Delivery>,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Option<Delivery> {
        self.queue.lock().await.recv().await
    }

    async fn ack(&mut self, _delivery: &Delivery) -> Result<()> {
        Ok(())
    }

    async fn nack(&mut self, delivery: Delivery) -> Result<()> {
        let sender = self.requeue.upgrade().ok_or(TransportError::Closed)?;
        sender
            .send(delivery.redelivery())
            .map_err(|_| TransportError::Closed)
    }
}
