//! Core projection trait.

use async_trait::async_trait;
use domain::{Event, MessageKind};

use crate::Result;

/// What a projection did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The read model changed.
    Changed,
    /// The event was already applied, or is not relevant to this projection.
    Unchanged,
}

/// A projection that processes events and updates a read model.
///
/// Projections must be idempotent: handling an event a second time leaves
/// the read model as the first time did.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Returns the event kinds this projection consumes.
    fn kinds(&self) -> &'static [MessageKind];

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &Event) -> Result<Applied>;
}
