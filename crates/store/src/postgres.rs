use std::collections::HashMap;

use async_trait::async_trait;
use common::{BookingId, EventId, VipBundleId};
use domain::VipBundle;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OutboxMessage, OutboxRecord, OutboxStore, Result, SagaStore, StoreError, Version, Versioned,
};

const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed saga and outbox store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    fn row_to_bundle(row: PgRow) -> Result<Versioned<VipBundle>> {
        let payload: serde_json::Value = row.try_get("payload")?;
        Ok(Versioned::new(
            serde_json::from_value(payload)?,
            Version::new(row.try_get("version")?),
        ))
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        let metadata: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, String> = serde_json::from_value(metadata)?;

        Ok(OutboxRecord {
            position: row.try_get("position")?,
            message: OutboxMessage {
                event_id: EventId::from_uuid(row.try_get::<Uuid, _>("event_id")?),
                topic: row.try_get("topic")?,
                payload: row.try_get("payload")?,
                metadata,
                partition_key: row.try_get("partition_key")?,
            },
            created_at: row.try_get("created_at")?,
            forwarded_at: row.try_get("forwarded_at")?,
        })
    }

    fn is_serialization_failure(e: &sqlx::Error) -> bool {
        matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(SERIALIZATION_FAILURE))
    }
}

/// Writes outbox messages inside an open transaction.
///
/// Returns the number of inserted rows; messages already present are skipped.
pub async fn insert_outbox_messages(
    tx: &mut Transaction<'_, Postgres>,
    messages: &[OutboxMessage],
) -> Result<usize> {
    let mut inserted = 0;
    for message in messages {
        let result = sqlx::query(
            r#"
            INSERT INTO outbox (event_id, topic, payload, metadata, partition_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(message.event_id.as_uuid())
        .bind(&message.topic)
        .bind(&message.payload)
        .bind(serde_json::to_value(&message.metadata)?)
        .bind(&message.partition_key)
        .execute(&mut **tx)
        .await?;
        inserted += result.rows_affected() as usize;
    }
    Ok(inserted)
}

#[async_trait]
impl SagaStore for PostgresStore {
    async fn insert(&self, bundle: &VipBundle, outbox: Vec<OutboxMessage>) -> Result<()> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO vip_bundles (vip_bundle_id, booking_id, payload, version)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(bundle.vip_bundle_id().as_uuid())
        .bind(bundle.booking_id().as_uuid())
        .bind(serde_json::to_value(bundle)?)
        .bind(Version::first().as_i64())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
            {
                return StoreError::AlreadyExists(format!(
                    "VIP bundle {} / booking {}",
                    bundle.vip_bundle_id(),
                    bundle.booking_id()
                ));
            }
            StoreError::Database(e)
        })?;

        insert_outbox_messages(&mut tx, &outbox).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, id: VipBundleId) -> Result<Option<Versioned<VipBundle>>> {
        let row = sqlx::query("SELECT payload, version FROM vip_bundles WHERE vip_bundle_id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_bundle).transpose()
    }

    async fn load_by_booking_id(&self, id: BookingId) -> Result<Option<Versioned<VipBundle>>> {
        let row = sqlx::query("SELECT payload, version FROM vip_bundles WHERE booking_id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_bundle).transpose()
    }

    async fn save(
        &self,
        bundle: &VipBundle,
        expected: Version,
        outbox: Vec<OutboxMessage>,
    ) -> Result<Version> {
        let id = bundle.vip_bundle_id();
        let conflict = |actual: Version| StoreError::ConcurrencyConflict {
            id: id.to_string(),
            expected,
            actual,
        };

        let result: Result<Version> = async {
            let mut tx = self.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE vip_bundles
                SET payload = $1, version = version + 1, updated_at = NOW()
                WHERE vip_bundle_id = $2 AND version = $3
                "#,
            )
            .bind(serde_json::to_value(bundle)?)
            .bind(id.as_uuid())
            .bind(expected.as_i64())
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                let actual: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM vip_bundles WHERE vip_bundle_id = $1")
                        .bind(id.as_uuid())
                        .fetch_optional(&mut *tx)
                        .await?;
                return match actual {
                    Some(actual) => Err(conflict(Version::new(actual))),
                    None => Err(StoreError::NotFound(format!("VIP bundle {id}"))),
                };
            }

            insert_outbox_messages(&mut tx, &outbox).await?;

            tx.commit().await?;
            Ok(expected.next())
        }
        .await;

        match result {
            Err(StoreError::Database(ref e)) if Self::is_serialization_failure(e) => {
                Err(conflict(expected))
            }
            other => other,
        }
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn append(&self, messages: Vec<OutboxMessage>) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_outbox_messages(&mut tx, &messages).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn fetch_pending(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT position, event_id, topic, payload, metadata, partition_key, created_at, forwarded_at
            FROM outbox
            WHERE forwarded_at IS NULL
            ORDER BY position ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn mark_forwarded(&self, event_ids: &[EventId]) -> Result<()> {
        let ids: Vec<Uuid> = event_ids.iter().map(|id| id.as_uuid()).collect();
        sqlx::query(
            "UPDATE outbox SET forwarded_at = NOW() WHERE event_id = ANY($1) AND forwarded_at IS NULL",
        )
        .bind(ids)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM outbox WHERE forwarded_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }
}
