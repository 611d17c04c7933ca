use async_trait::async_trait;
use common::{BookingId, TicketId};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::store::{Merge, OpsBookingStore};
use crate::{OpsBooking, ProjectionError, Result};

const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";
const MAX_ATTEMPTS: u32 = 5;

/// PostgreSQL-backed ops booking store.
#[derive(Clone)]
pub struct PostgresOpsBookingStore {
    pool: PgPool,
}

impl PostgresOpsBookingStore {
    /// Creates a new store over `pool`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_booking(row: PgRow) -> Result<OpsBooking> {
        let payload: serde_json::Value = row.try_get("payload")?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn index_tickets(
        tx: &mut Transaction<'_, Postgres>,
        booking: &OpsBooking,
    ) -> Result<()> {
        for ticket_id in booking.tickets.keys() {
            sqlx::query(
                r#"
                INSERT INTO ops_booking_tickets (ticket_id, booking_id)
                VALUES ($1, $2)
                ON CONFLICT (ticket_id) DO NOTHING
                "#,
            )
            .bind(ticket_id.as_uuid())
            .bind(booking.booking_id.as_uuid())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn try_update(
        &self,
        booking_id: BookingId,
        merge: Merge<'_>,
    ) -> Result<(OpsBooking, bool)> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query("SELECT payload, version FROM ops_bookings WHERE booking_id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ProjectionError::BookingNotFound(booking_id))?;
        let version: i64 = row.try_get("version")?;
        let mut booking = Self::row_to_booking(row)?;

        if !merge(&mut booking) {
            return Ok((booking, false));
        }

        let updated = sqlx::query(
            r#"
            UPDATE ops_bookings
            SET payload = $1, version = version + 1, updated_at = NOW()
            WHERE booking_id = $2 AND version = $3
            "#,
        )
        .bind(serde_json::to_value(&booking)?)
        .bind(booking_id.as_uuid())
        .bind(version)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(ProjectionError::ConcurrencyConflict(booking_id));
        }

        Self::index_tickets(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok((booking, true))
    }
}

#[async_trait]
impl OpsBookingStore for PostgresOpsBookingStore {
    async fn create(&self, booking: OpsBooking) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO ops_bookings (booking_id, payload, version)
            VALUES ($1, $2, 1)
            "#,
        )
        .bind(booking.booking_id.as_uuid())
        .bind(serde_json::to_value(&booking)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
            {
                return ProjectionError::AlreadyExists(booking.booking_id);
            }
            ProjectionError::Database(e)
        })?;

        Self::index_tickets(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, booking_id: BookingId, merge: Merge<'_>) -> Result<(OpsBooking, bool)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_update(booking_id, merge).await {
                Err(ProjectionError::Database(sqlx::Error::Database(db_err)))
                    if db_err.code().as_deref() == Some(SERIALIZATION_FAILURE)
                        && attempt < MAX_ATTEMPTS =>
                {
                    tracing::debug!(%booking_id, attempt, "Serialization failure, retrying");
                }
                Err(ProjectionError::ConcurrencyConflict(_)) if attempt < MAX_ATTEMPTS => {
                    tracing::debug!(%booking_id, attempt, "Conflicting update, retrying");
                }
                other => return other,
            }
        }
    }

    async fn booking_id_for_ticket(&self, ticket_id: TicketId) -> Result<Option<BookingId>> {
        let booking_id: Option<Uuid> =
            sqlx::query_scalar("SELECT booking_id FROM ops_booking_tickets WHERE ticket_id = $1")
                .bind(ticket_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(booking_id.map(BookingId::from_uuid))
    }

    async fn get(&self, booking_id: BookingId) -> Result<Option<OpsBooking>> {
        let row = sqlx::query("SELECT payload FROM ops_bookings WHERE booking_id = $1")
            .bind(booking_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn list(&self) -> Result<Vec<OpsBooking>> {
        let rows = sqlx::query(
            "SELECT payload FROM ops_bookings ORDER BY (payload->>'booked_at')::timestamptz DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_booking).collect()
    }
}
