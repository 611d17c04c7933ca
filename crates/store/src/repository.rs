use common::{BookingId, VipBundleId};
use domain::VipBundle;
use tracing::{debug, instrument, warn};

use crate::{OutboxMessage, Result, SagaStore, StoreError};

/// Default number of attempts for an update that keeps hitting conflicts.
pub const DEFAULT_MAX_UPDATE_ATTEMPTS: u32 = 10;

/// The result of an update function: the new state of the bundle and the
/// messages to commit with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub bundle: VipBundle,
    pub outbox: Vec<OutboxMessage>,
}

impl Change {
    /// Creates a change committing `bundle` together with `outbox`.
    pub fn new(bundle: VipBundle, outbox: Vec<OutboxMessage>) -> Self {
        Self { bundle, outbox }
    }
}

/// Outcome of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The update function produced a change and it was committed.
    Updated(VipBundle),
    /// The update function decided there was nothing to do.
    Unchanged(VipBundle),
    /// The bundle does not exist; the update was not attempted.
    Skipped,
}

impl UpdateOutcome {
    /// Returns true if the bundle did not exist.
    pub fn is_skipped(&self) -> bool {
        matches!(self, UpdateOutcome::Skipped)
    }

    /// Returns the bundle after the update, if it exists.
    pub fn bundle(&self) -> Option<&VipBundle> {
        match self {
            UpdateOutcome::Updated(b) | UpdateOutcome::Unchanged(b) => Some(b),
            UpdateOutcome::Skipped => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Key {
    Id(VipBundleId),
    Booking(BookingId),
}

/// Conditional-update access to VIP bundles.
///
/// Updates read the current state, run a pure update function and write the
/// result back if nobody else wrote in between. On conflict the whole cycle
/// is repeated with fresh state, so update functions must not have side
/// effects.
#[derive(Clone)]
pub struct VipBundleRepository<S> {
    store: S,
    max_attempts: u32,
}

impl<S: SagaStore> VipBundleRepository<S> {
    /// Creates a new repository over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_UPDATE_ATTEMPTS,
        }
    }

    /// Sets the number of attempts before a conflict is returned to the caller.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores a new bundle together with its initial messages.
    #[instrument(skip(self, bundle, outbox), fields(vip_bundle_id = %bundle.vip_bundle_id()))]
    pub async fn add(&self, bundle: &VipBundle, outbox: Vec<OutboxMessage>) -> Result<()> {
        self.store.insert(bundle, outbox).await
    }

    /// Loads a bundle by id.
    pub async fn get(&self, id: VipBundleId) -> Result<VipBundle> {
        self.store
            .load(id)
            .await?
            .map(|v| v.value)
            .ok_or_else(|| StoreError::NotFound(format!("VIP bundle {id}")))
    }

    /// Loads the bundle of a show booking.
    pub async fn get_by_booking_id(&self, id: BookingId) -> Result<VipBundle> {
        self.store
            .load_by_booking_id(id)
            .await?
            .map(|v| v.value)
            .ok_or_else(|| StoreError::NotFound(format!("VIP bundle for booking {id}")))
    }

    /// Updates the bundle with id `id`.
    #[instrument(skip(self, update))]
    pub async fn update_by_id<F, E>(
        &self,
        id: VipBundleId,
        update: F,
    ) -> std::result::Result<UpdateOutcome, E>
    where
        F: Fn(&VipBundle) -> std::result::Result<Option<Change>, E> + Send + Sync,
        E: From<StoreError> + Send,
    {
        self.update(Key::Id(id), update).await
    }

    /// Updates the bundle whose show booking is `id`.
    #[instrument(skip(self, update))]
    pub async fn update_by_booking_id<F, E>(
        &self,
        id: BookingId,
        update: F,
    ) -> std::result::Result<UpdateOutcome, E>
    where
        F: Fn(&VipBundle) -> std::result::Result<Option<Change>, E> + Send + Sync,
        E: From<StoreError> + Send,
    {
        self.update(Key::Booking(id), update).await
    }

    async fn update<F, E>(&self, key: Key, update: F) -> std::result::Result<UpdateOutcome, E>
    where
        F: Fn(&VipBundle) -> std::result::Result<Option<Change>, E> + Send + Sync,
        E: From<StoreError> + Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = match key {
                Key::Id(id) => self.store.load(id).await?,
                Key::Booking(id) => self.store.load_by_booking_id(id).await?,
            };
            let Some(current) = current else {
                debug!(?key, "VIP bundle not found, skipping update");
                return Ok(UpdateOutcome::Skipped);
            };

            let Some(change) = update(&current.value)? else {
                return Ok(UpdateOutcome::Unchanged(current.value));
            };

            match self
                .store
                .save(&change.bundle, current.version, change.outbox)
                .await
            {
                Ok(_) => return Ok(UpdateOutcome::Updated(change.bundle)),
                Err(StoreError::ConcurrencyConflict {
                    expected, actual, ..
                }) if attempt < self.max_attempts => {
                    warn!(?key, %expected, %actual, attempt, "Conflicting VIP bundle write, retrying");
                    metrics::counter!("saga_store_conflicts_total").increment(1);
                }
                Err(StoreError::NotFound(_)) => return Ok(UpdateOutcome::Skipped),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
