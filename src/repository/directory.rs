//! Read-only access to the service catalog and staff directory tables

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Pool, Postgres};
use uuid::Uuid;

use super::{ServiceCatalog, StaffDirectory, StoreError, StoreResult};
use crate::{models::ServiceSpec, scheduling::TimeInterval};

#[derive(FromRow)]
struct TimeOffRow {
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl TryFrom<TimeOffRow> for TimeInterval {
    type Error = StoreError;

    fn try_from(row: TimeOffRow) -> Result<Self, Self::Error> {
        TimeInterval::new(row.starts_at, row.ends_at)
            .map_err(|e| StoreError::Backend(format!("corrupt time off row: {}", e)))
    }
}

#[derive(Clone)]
pub struct DirectoryRepository {
    pool: Pool<Postgres>,
}

impl DirectoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceCatalog for DirectoryRepository {
    async fn get_service(&self, service_id: Uuid) -> StoreResult<Option<ServiceSpec>> {
        let service = sqlx::query_as::<_, ServiceSpec>(
            r#"
            SELECT id, provider_id, name, duration_minutes, buffer_before_minutes, buffer_after_minutes
            FROM services
            WHERE id = $1
            "#,
        )
        .bind(service_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }
}

#[async_trait]
impl StaffDirectory for DirectoryRepository {
    async fn list_staff(&self, provider_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM staff WHERE provider_id = $1 AND active ORDER BY id",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn get_staff_time_off(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<TimeInterval>> {
        let rows = sqlx::query_as::<_, TimeOffRow>(
            r#"
            SELECT starts_at, ends_at FROM staff_time_off
            WHERE staff_id = $1 AND starts_at < $3 AND ends_at > $2
            ORDER BY starts_at
            "#,
        )
        .bind(staff_id)
        .bind(window.start())
        .bind(window.end())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TimeInterval::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, 0, 0).unwrap()
    }

    #[test]
    fn test_time_off_row_mapping() {
        let row = TimeOffRow { starts_at: at(9), ends_at: at(12) };
        let interval = TimeInterval::try_from(row).unwrap();
        assert_eq!((interval.start(), interval.end()), (at(9), at(12)));
    }

    #[test]
    fn test_inverted_time_off_row_is_backend_error() {
        let row = TimeOffRow { starts_at: at(12), ends_at: at(9) };
        assert!(matches!(TimeInterval::try_from(row), Err(StoreError::Backend(_))));
    }
}
