//! Saga state store and transactional outbox.
//!
//! [`SagaStore`] persists [`domain::VipBundle`] aggregates; every write
//! carries the [`OutboxMessage`]s it causes and commits them atomically with
//! the aggregate row. [`VipBundleRepository`] layers conditional,
//! conflict-retrying updates on top. [`OutboxStore`] is the forwarder's view
//! of the outbox.

pub mod error;
pub mod memory;
pub mod outbox;
pub mod postgres;
pub mod repository;
pub mod saga_store;
pub mod version;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use outbox::{
    META_IDEMPOTENCY_KEY, META_NAME, META_PARTITION_KEY, META_PUBLISHED_AT, OutboxMessage,
    OutboxRecord, OutboxStore,
};
pub use postgres::{PostgresStore, insert_outbox_messages};
pub use repository::{Change, DEFAULT_MAX_UPDATE_ATTEMPTS, UpdateOutcome, VipBundleRepository};
pub use saga_store::SagaStore;
pub use version::{Version, Versioned};
