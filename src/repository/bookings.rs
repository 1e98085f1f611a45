//! Bookings repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, Pool, Postgres};
use uuid::Uuid;

use super::{BookingStore, StoreError, StoreResult};
use crate::scheduling::{booking::HistoryEntry, Booking, TimeInterval};

#[derive(FromRow)]
struct BookingRow {
    id: Uuid,
    provider_id: Uuid,
    staff_id: Uuid,
    service_id: Uuid,
    customer_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    status: String,
    history: Json<Vec<HistoryEntry>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> StoreResult<Self> {
        let id = row.id;
        let corrupt = move |e: crate::error::AppError| {
            StoreError::Backend(format!("corrupt booking {}: {}", id, e))
        };
        Ok(Booking {
            id,
            provider_id: row.provider_id,
            staff_id: row.staff_id,
            service_id: row.service_id,
            customer_id: row.customer_id,
            interval: TimeInterval::new(row.starts_at, row.ends_at).map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            history: row.history.0,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct BookingsRepository {
    pool: Pool<Postgres>,
}

impl BookingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for BookingsRepository {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Booking::try_from)
            .transpose()
    }

    async fn overlapping(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT * FROM bookings
            WHERE staff_id = $1
              AND status <> 'cancelled'
              AND starts_at < $3
              AND ends_at > $2
            ORDER BY starts_at
            "#,
        )
        .bind(staff_id)
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, provider_id, staff_id, service_id, customer_id,
                                  starts_at, ends_at, status, history, version,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(booking.id)
        .bind(booking.provider_id)
        .bind(booking.staff_id)
        .bind(booking.service_id)
        .bind(booking.customer_id)
        .bind(booking.interval.start())
        .bind(booking.interval.end())
        .bind(booking.status.as_str())
        .bind(Json(&booking.history))
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, booking: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET staff_id = $3, starts_at = $4, ends_at = $5, status = $6,
                history = $7, version = $2, updated_at = $8
            WHERE id = $1 AND version = $2 - 1
            "#,
        )
        .bind(booking.id)
        .bind(booking.version)
        .bind(booking.staff_id)
        .bind(booking.interval.start())
        .bind(booking.interval.end())
        .bind(booking.status.as_str())
        .bind(Json(&booking.history))
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::VersionMismatch);
        }
        Ok(())
    }
}
