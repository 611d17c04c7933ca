use std::sync::Arc;

use async_trait::async_trait;
use domain::{Event, MessageKind};
use messaging::{HandlerError, HandlerOutcome, Message, MessageHandler};
use store::{SagaStore, UpdateOutcome};

use crate::process_manager::VipBundleProcessManager;

/// Feeds one event kind into the process manager.
pub struct ProcessManagerHandler<S> {
    manager: Arc<VipBundleProcessManager<S>>,
    kind: MessageKind,
}

impl<S> ProcessManagerHandler<S> {
    /// Creates a handler feeding events of `kind` to `manager`.
    pub fn new(manager: Arc<VipBundleProcessManager<S>>, kind: MessageKind) -> Self {
        Self { manager, kind }
    }
}

#[async_trait]
impl<S: SagaStore + 'static> MessageHandler for ProcessManagerHandler<S> {
    async fn handle(&self, message: &Message) -> Result<HandlerOutcome, HandlerError> {
        let event = Event::from_payload(self.kind, message.payload.clone())
            .map_err(|e| HandlerError::undecodable(message, e))?;

        Ok(match self.manager.handle(&event).await? {
            UpdateOutcome::Updated(_) => HandlerOutcome::Handled,
            UpdateOutcome::Unchanged(_) | UpdateOutcome::Skipped => HandlerOutcome::Skipped,
        })
    }
}
