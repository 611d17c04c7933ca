use std::future::Future;

use async_trait::async_trait;
use thiserror::Error;

use crate::Message;

/// How a handler failed, which decides what the router does with the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The handler may succeed later; the message is redelivered with backoff
    /// until the attempt limit is reached, then poisoned.
    #[error("transient handler error: {0}")]
    Transient(String),

    /// The message can never be handled; it goes to the poison topic at once.
    #[error("fatal handler error: {0}")]
    Fatal(String),
}

impl HandlerError {
    /// Creates a retryable error.
    pub fn transient(reason: impl std::fmt::Display) -> Self {
        HandlerError::Transient(reason.to_string())
    }

    /// Creates an error that poisons the message.
    pub fn fatal(reason: impl std::fmt::Display) -> Self {
        HandlerError::Fatal(reason.to_string())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }

    /// A payload that does not decode will never decode.
    pub fn undecodable(message: &Message, err: serde_json::Error) -> Self {
        HandlerError::Fatal(format!(
            "cannot decode {} message {}: {err}",
            message.name().unwrap_or("unnamed"),
            message.id
        ))
    }
}

/// Successful handler result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The message had an effect.
    Handled,
    /// The message was a stale or duplicate delivery and was ignored.
    Skipped,
}

impl HandlerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerOutcome::Handled => "handled",
            HandlerOutcome::Skipped => "skipped",
        }
    }
}

/// Handles messages of one topic.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError>;
}

/// Adapts an async closure into a [`MessageHandler`].
pub struct HandlerFn<F>(F);

/// Wraps `f` as a message handler.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutcome, HandlerError>> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> MessageHandler for HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutcome, HandlerError>> + Send,
{
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        (self.0)(message.clone()).await
    }
}
