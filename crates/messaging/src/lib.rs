//! Messaging for the travel bundle saga.
//!
//! - [`Publisher`] / [`Subscriber`] / [`Subscription`]: the at-least-once
//!   transport boundary, with [`InMemoryBus`] as the in-process transport
//! - [`Router`]: the handler table, with per-message deadlines, bounded
//!   exponential backoff and a poison topic
//! - [`OutboxForwarder`]: the supervised relay from the outbox to the
//!   transport

pub mod error;
pub mod forwarder;
pub mod handler;
pub mod memory;
pub mod message;
pub mod retry;
pub mod router;
pub mod transport;

pub use error::{Result, TransportError};
pub use forwarder::{ForwarderConfig, ForwarderHealth, OutboxForwarder};
pub use handler::{HandlerError, HandlerFn, HandlerOutcome, MessageHandler, handler_fn};
pub use memory::InMemoryBus;
pub use message::{Delivery, Message};
pub use retry::RetryPolicy;
pub use router::{
    META_POISONED_ATTEMPTS, META_POISONED_HANDLER, META_POISONED_REASON, META_POISONED_TOPIC,
    POISON_TOPIC, Router, RouterConfig, RouterHandle,
};
pub use transport::{Publisher, Subscriber, Subscription};
