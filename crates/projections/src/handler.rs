//! Feeds transport messages into a projection.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{Event, MessageKind};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use tracing::warn;

use crate::ProjectionError;
use crate::projection::{Applied, Projection};

/// Handles one event kind on behalf of a projection.
pub struct ProjectionHandler {
    projection: Arc<dyn Projection>,
    kind: MessageKind,
}

impl ProjectionHandler {
    /// Creates a handler feeding messages of `kind` to `projection`.
    pub fn new(projection: Arc<dyn Projection>, kind: MessageKind) -> Self {
        Self { projection, kind }
    }

    /// Returns a handler for each kind the projection consumes.
    pub fn for_projection(projection: Arc<dyn Projection>) -> Vec<(MessageKind, Self)> {
        projection
            .kinds()
            .iter()
            .map(|kind| (*kind, Self::new(projection.clone(), *kind)))
            .collect()
    }
}

#[async_trait]
impl MessageHandler for ProjectionHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let event = Event::from_payload(self.kind, message.payload.clone())
            .map_err(|e| HandlerError::undecodable(message, e))?;

        match self.projection.handle(&event).await {
            Ok(Applied::Changed) => Ok(HandlerOutcome::Handled),
            Ok(Applied::Unchanged) => Ok(HandlerOutcome::Skipped),
            Err(ProjectionError::AlreadyExists(booking_id)) => {
                warn!(
                    projection = self.projection.name(),
                    %booking_id,
                    event_id = %message.id,
                    "Ops booking already exists, dropping duplicate"
                );
                Ok(HandlerOutcome::Skipped)
            }
            Err(e) if e.is_transient() => Err(HandlerError::transient(e)),
            Err(e) => Err(HandlerError::fatal(e)),
        }
    }
}
