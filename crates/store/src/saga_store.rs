use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, VipBundleId};
use domain::VipBundle;

use crate::{OutboxMessage, Result, Version, Versioned};

/// Persistence of VIP bundle aggregates.
///
/// Every write takes the outbox messages caused by it; the aggregate row and
/// the outbox records are committed in one transaction or not at all.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts a new bundle at [`Version::first`].
    ///
    /// Fails with `AlreadyExists` if either the VIP bundle id or the booking
    /// id is taken.
    async fn insert(&self, bundle: &VipBundle, outbox: Vec<OutboxMessage>) -> Result<()>;

    /// Loads a bundle by its id.
    async fn load(&self, id: VipBundleId) -> Result<Option<Versioned<VipBundle>>>;

    /// Loads a bundle by the id of its show booking.
    async fn load_by_booking_id(&self, id: BookingId) -> Result<Option<Versioned<VipBundle>>>;

    /// Replaces a bundle if it is still at `expected`.
    ///
    /// Fails with `ConcurrencyConflict` if another write got there first and
    /// with `NotFound` if the bundle does not exist. Returns the new version.
    async fn save(
        &self,
        bundle: &VipBundle,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version>;
}

#[async_trait]
impl<T: SagaStore + ?Sized> SagaStore for Arc<T> {
    async fn insert(&self, bundle: &VipBundle, outbox: Vec<OutboxMessage>) -> Result<()> {
        (**self).insert(bundle, outbox).await
    }

    async fn load(&self, id: VipBundleId) -> Result<Option<Versioned<VipBundle>>> {
        (**self).load(id).await
    }

    async fn load_by_booking_id(&self, id: BookingId) -> Result<Option<Versioned<VipBundle>>> {
        (**self).load_by_booking_id(id).await
    }

    async fn save(
        &self,
        bundle: &VipBundle,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        (**self).save(bundle, expected, outbox).await
    }
}
