//! Booking request/response models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    scheduling::{Booking, BookingStatus, NewBooking, TimeInterval},
    scheduling::booking::HistoryEntry,
};

/// Create booking request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBooking {
    pub provider_id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    /// Slot start (ISO 8601)
    pub start: DateTime<Utc>,
    /// Slot end (ISO 8601)
    pub end: DateTime<Utc>,
}

impl CreateBooking {
    pub fn into_new_booking(self) -> AppResult<NewBooking> {
        Ok(NewBooking {
            provider_id: self.provider_id,
            staff_id: self.staff_id,
            service_id: self.service_id,
            customer_id: self.customer_id,
            interval: TimeInterval::new(self.start, self.end)?,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignStaff {
    pub staff_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleBooking {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl RescheduleBooking {
    pub fn interval(&self) -> AppResult<TimeInterval> {
        TimeInterval::new(self.start, self.end)
    }
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CancelBooking {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CompleteBooking {
    /// Complete before the booked interval has ended
    #[serde(default)]
    pub force: bool,
}

/// Booking with its audit history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingResponse {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: BookingStatus,
    pub history: Vec<HistoryEntry>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id,
            provider_id: b.provider_id,
            staff_id: b.staff_id,
            service_id: b.service_id,
            customer_id: b.customer_id,
            start: b.interval.start(),
            end: b.interval.end(),
            status: b.status,
            history: b.history,
            version: b.version,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}
