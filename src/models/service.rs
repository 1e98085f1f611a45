//! Catalog service as seen by the scheduler

use chrono::Duration;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Bookable service with its duration and buffers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ServiceSpec {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub buffer_before_minutes: i32,
    pub buffer_after_minutes: i32,
}

impl ServiceSpec {
    /// Time a booking of this service occupies, buffers included
    pub fn slot_length(&self) -> Duration {
        Duration::minutes(
            i64::from(self.duration_minutes)
                + i64::from(self.buffer_before_minutes)
                + i64::from(self.buffer_after_minutes),
        )
    }
}
