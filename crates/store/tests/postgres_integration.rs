//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::Utc;
use common::{BookingId, FlightId, ShowId, VipBundleId};
use domain::{Event, EventHeader, NewVipBundle, VipBundle, VipBundleFinalized, VipBundleInitialized};
use serial_test::serial;
use sqlx::PgPool;
use store::{
    Change, OutboxMessage, OutboxStore, PostgresStore, SagaStore, StoreError, UpdateOutcome,
    Version, VipBundleRepository,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE vip_bundles, outbox, ops_booking_tickets, ops_bookings")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn test_bundle() -> VipBundle {
    VipBundle::new(NewVipBundle {
        vip_bundle_id: VipBundleId::new(),
        booking_id: BookingId::new(),
        customer_email: "vip@example.com".to_string(),
        number_of_tickets: 2,
        show_id: ShowId::new(),
        passengers: vec!["A".to_string(), "B".to_string()],
        inbound_flight_id: FlightId::new(),
        return_flight_id: FlightId::new(),
    })
    .unwrap()
}

fn initialized(bundle: &VipBundle) -> OutboxMessage {
    OutboxMessage::event(&Event::VipBundleInitialized(VipBundleInitialized {
        header: EventHeader::for_fact(bundle.vip_bundle_id().to_string(), "VipBundleInitialized"),
        vip_bundle_id: bundle.vip_bundle_id(),
    }))
    .unwrap()
}

fn finalized(bundle: &VipBundle) -> OutboxMessage {
    OutboxMessage::event(&Event::VipBundleFinalized(VipBundleFinalized {
        header: EventHeader::for_fact(bundle.vip_bundle_id().to_string(), "VipBundleFinalized"),
        vip_bundle_id: bundle.vip_bundle_id(),
    }))
    .unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_insert_and_load_bundle() {
    let store = get_test_store().await;
    let bundle = test_bundle();

    store.insert(&bundle, vec![initialized(&bundle)]).await.unwrap();

    let loaded = store.load(bundle.vip_bundle_id()).await.unwrap().unwrap();
    assert_eq!(loaded.value, bundle);
    assert_eq!(loaded.version, Version::first());

    let by_booking = store
        .load_by_booking_id(bundle.booking_id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_booking.value.vip_bundle_id(), bundle.vip_bundle_id());

    let pending = store.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message.topic, "internal-events.svc-tickets.VipBundleInitialized");
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_duplicate_booking_id_is_rejected() {
    let store = get_test_store().await;
    let bundle = test_bundle();
    store.insert(&bundle, vec![]).await.unwrap();

    let result = store.insert(&bundle, vec![]).await;
    assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_rolled_back_save_leaves_no_outbox_record() {
    let store = get_test_store().await;
    let bundle = test_bundle();
    store.insert(&bundle, vec![]).await.unwrap();
    store.save(&bundle, Version::first(), vec![]).await.unwrap();

    let result = store
        .save(&bundle, Version::first(), vec![finalized(&bundle)])
        .await;

    assert!(matches!(
        result,
        Err(StoreError::ConcurrencyConflict { .. })
    ));
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_committed_save_writes_outbox_record() {
    let store = get_test_store().await;
    let repo = VipBundleRepository::new(store.clone());
    let bundle = test_bundle();
    repo.add(&bundle, vec![]).await.unwrap();

    let outcome = repo
        .update_by_id(bundle.vip_bundle_id(), |b| {
            let mut b = b.clone();
            b.record_booking_made(Utc::now());
            Ok::<_, StoreError>(Some(Change::new(b.clone(), vec![finalized(&b)])))
        })
        .await
        .unwrap();

    assert!(matches!(outcome, UpdateOutcome::Updated(_)));
    let loaded = store.load(bundle.vip_bundle_id()).await.unwrap().unwrap();
    assert_eq!(loaded.version, Version::new(2));
    assert!(loaded.value.booking_made_at().is_some());
    assert_eq!(store.pending_count().await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_concurrent_updates_are_serialized() {
    let store = get_test_store().await;
    let repo = VipBundleRepository::new(store.clone());
    let bundle = test_bundle();
    repo.add(&bundle, vec![]).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let repo = repo.clone();
        let id = bundle.vip_bundle_id();
        handles.push(tokio::spawn(async move {
            repo.update_by_id(id, |b| {
                let mut b = b.clone();
                let ticket = common::TicketId::new();
                match b.add_ticket(ticket) {
                    Ok(true) => Ok::<_, StoreError>(Some(Change::new(b, vec![]))),
                    Ok(false) | Err(_) => Ok(None),
                }
            })
            .await
        }));
    }
    for handle in handles {
        let _: Result<UpdateOutcome, StoreError> = handle.await.unwrap();
    }

    let loaded = repo.get(bundle.vip_bundle_id()).await.unwrap();
    // Only two tickets fit; no write may have been lost or duplicated.
    assert_eq!(loaded.ticket_ids().len(), 2);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn test_outbox_is_idempotent_and_ordered() {
    let store = get_test_store().await;
    let first = initialized(&test_bundle());
    let second = initialized(&test_bundle());

    assert_eq!(
        store
            .append(vec![first.clone(), second.clone()])
            .await
            .unwrap(),
        2
    );
    assert_eq!(store.append(vec![first.clone()]).await.unwrap(), 0);

    let pending = store.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].message, first);
    assert_eq!(pending[1].message, second);

    store.mark_forwarded(&[first.event_id]).await.unwrap();
    let pending = store.fetch_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].message.event_id, second.event_id);
}
