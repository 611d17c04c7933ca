use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{BookingId, EventId, VipBundleId};
use domain::VipBundle;
use tokio::sync::RwLock;

use crate::{
    OutboxMessage, OutboxRecord, OutboxStore, Result, SagaStore, StoreError, Version, Versioned,
};

#[derive(Default)]
struct State {
    bundles: HashMap<VipBundleId, Versioned<VipBundle>>,
    by_booking: HashMap<BookingId, VipBundleId>,
    /// Records not yet forwarded, keyed by position.
    pending: BTreeMap<i64, OutboxRecord>,
    pending_positions: HashMap<EventId, i64>,
    /// Ids of every record ever stored. Forwarded records are dropped, their
    /// ids are kept for deduplication.
    outbox_ids: HashSet<EventId>,
    last_position: i64,
}

impl State {
    fn append_outbox(&mut self, messages: Vec<OutboxMessage>) -> usize {
        let mut appended = 0;
        for message in messages {
            if !self.outbox_ids.insert(message.event_id) {
                continue;
            }
            self.last_position += 1;
            let position = self.last_position;
            self.pending_positions.insert(message.event_id, position);
            self.pending.insert(
                position,
                OutboxRecord {
                    position,
                    message,
                    created_at: Utc::now(),
                    forwarded_at: None,
                },
            );
            appended += 1;
        }
        appended
    }

    fn forward(&mut self, event_id: &EventId) {
        if let Some(position) = self.pending_positions.remove(event_id) {
            self.pending.remove(&position);
        }
    }
}

/// In-memory saga and outbox store for testing.
///
/// Bundles and outbox records live behind one lock, so a write either lands
/// completely or not at all, just like the PostgreSQL transaction.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the records not yet forwarded, in insertion order.
    pub async fn pending_records(&self) -> Vec<OutboxRecord> {
        self.state.read().await.pending.values().cloned().collect()
    }

    /// Returns the number of records ever stored, forwarded or not.
    pub async fn appended_count(&self) -> usize {
        self.state.read().await.outbox_ids.len()
    }

    /// Returns the number of stored bundles.
    pub async fn bundle_count(&self) -> usize {
        self.state.read().await.bundles.len()
    }
}

#[async_trait]
impl SagaStore for InMemoryStore {
    async fn insert(&self, bundle: &VipBundle, outbox: Vec<OutboxMessage>) -> Result<()> {
        let mut state = self.state.write().await;

        if state.bundles.contains_key(&bundle.vip_bundle_id()) {
            return Err(StoreError::AlreadyExists(format!(
                "VIP bundle {}",
                bundle.vip_bundle_id()
            )));
        }
        if state.by_booking.contains_key(&bundle.booking_id()) {
            return Err(StoreError::AlreadyExists(format!(
                "VIP bundle for booking {}",
                bundle.booking_id()
            )));
        }

        state
            .by_booking
            .insert(bundle.booking_id(), bundle.vip_bundle_id());
        state.bundles.insert(
            bundle.vip_bundle_id(),
            Versioned::new(bundle.clone(), Version::first()),
        );
        state.append_outbox(outbox);
        Ok(())
    }

    async fn load(&self, id: VipBundleId) -> Result<Option<Versioned<VipBundle>>> {
        Ok(self.state.read().await.bundles.get(&id).cloned())
    }

    async fn load_by_booking_id(&self, id: BookingId) -> Result<Option<Versioned<VipBundle>>> {
        let state = self.state.read().await;
        Ok(state
            .by_booking
            .get(&id)
            .and_then(|vip_bundle_id| state.bundles.get(vip_bundle_id))
            .cloned())
    }

    async fn save(
        &self,
        bundle: &VipBundle,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        let mut state = self.state.write().await;
        let id = bundle.vip_bundle_id();

        let Some(current) = state.bundles.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("VIP bundle {id}")));
        };
        if current.version != expected {
            return Err(StoreError::ConcurrencyConflict {
                id: id.to_string(),
                expected,
                actual: current.version,
            });
        }

        let version = expected.next();
        *current = Versioned::new(bundle.clone(), version);
        state.append_outbox(outbox);
        Ok(version)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn append(&self, messages: Vec<OutboxMessage>) -> Result<usize> {
        Ok(self.state.write().await.append_outbox(messages))
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let state = self.state.read().await;
        Ok(state.pending.values().take(limit).cloned().collect())
    }

    async fn mark_forwarded(&self, event_ids: &[EventId]) -> Result<()> {
        let mut state = self.state.write().await;
        for event_id in event_ids {
            state.forward(event_id);
        }
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64> {
        Ok(self.state.read().await.pending.len() as u64)
    }
}
