//! Booking service: creation and lifecycle transitions

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::booking::{CancelBooking, CreateBooking},
    repository::Repository,
    scheduling::{Booking, BookingAction, ProviderAvailability, StaffSchedule, TimeInterval},
    services::{
        clock::Clock,
        guard::{ConflictGuard, Write},
    },
};

#[derive(Clone)]
pub struct BookingService {
    repository: Repository,
    guard: ConflictGuard,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(
        repository: Repository,
        guard: ConflictGuard,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            guard,
            clock,
        }
    }

    /// Get booking by ID
    pub async fn get(&self, id: Uuid) -> AppResult<Booking> {
        self.repository
            .bookings
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    async fn availability(&self, provider_id: Uuid) -> AppResult<ProviderAvailability> {
        self.repository
            .availability
            .load(provider_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Provider {} not found", provider_id)))
    }

    async fn ensure_staff(&self, provider_id: Uuid, staff_id: Uuid) -> AppResult<()> {
        let staff = self.repository.staff.list_staff(provider_id).await?;
        if !staff.contains(&staff_id) {
            return Err(AppError::NotFound(format!(
                "Staff {} not found for provider {}",
                staff_id, provider_id
            )));
        }
        Ok(())
    }

    /// Reject intervals in the past or outside the staff member's open time
    async fn ensure_bookable(
        &self,
        availability: &ProviderAvailability,
        staff_id: Uuid,
        interval: &TimeInterval,
    ) -> AppResult<()> {
        if interval.start() < self.clock.now() {
            return Err(AppError::InvalidInterval(format!(
                "Interval starting {} is in the past",
                interval.start()
            )));
        }
        let time_off = self
            .repository
            .staff
            .get_staff_time_off(staff_id, *interval)
            .await?;
        let schedule = StaffSchedule::new(availability, Some(staff_id), &time_off);
        if !schedule.covers(interval) {
            return Err(AppError::InvalidInterval(format!(
                "Staff {} is not available between {} and {}",
                staff_id,
                interval.start(),
                interval.end()
            )));
        }
        Ok(())
    }

    /// Create a booking for a free slot. The `Created` event is published
    /// once the booking is stored, even if the caller stops waiting.
    pub async fn create(&self, data: CreateBooking) -> AppResult<Booking> {
        let new = data.into_new_booking()?;

        let service = match self.repository.catalog.get_service(new.service_id).await? {
            Some(service) if service.provider_id == new.provider_id => service,
            _ => {
                return Err(AppError::NotFound(format!(
                    "Service {} not found for provider {}",
                    new.service_id, new.provider_id
                )))
            }
        };
        if new.interval.duration() != service.slot_length() {
            return Err(AppError::InvalidInterval(format!(
                "Interval lasts {} minutes but service {} needs {}",
                new.interval.duration().num_minutes(),
                service.id,
                service.slot_length().num_minutes()
            )));
        }

        self.ensure_staff(new.provider_id, new.staff_id).await?;
        let availability = self.availability(new.provider_id).await?;
        self.ensure_bookable(&availability, new.staff_id, &new.interval).await?;

        let (booking, event) = Booking::create(new, self.clock.now());
        let booking = self.guard.reserve(booking, Write::Insert, event).await?;
        tracing::info!(
            "Booking {} created for staff {} at {}",
            booking.id,
            booking.staff_id,
            booking.interval.start()
        );
        Ok(booking)
    }

    /// Apply `action` and persist the result
    async fn transition(&self, id: Uuid, action: BookingAction) -> AppResult<Booking> {
        let current = self.get(id).await?;
        let claims_time = matches!(
            action,
            BookingAction::AssignStaff { .. } | BookingAction::Reschedule { .. }
        );
        let (next, event) = current.apply(action, self.clock.now())?;
        let kind = event.kind;

        let saved = if claims_time {
            if next.staff_id != current.staff_id {
                self.ensure_staff(next.provider_id, next.staff_id).await?;
            }
            let availability = self.availability(next.provider_id).await?;
            self.ensure_bookable(&availability, next.staff_id, &next.interval).await?;
            self.guard.reserve(next, Write::Update, event).await?
        } else {
            self.guard.commit(next, event).await?
        };

        tracing::info!(
            "Booking {}: {} -> {} ({:?})",
            saved.id,
            current.status,
            saved.status,
            kind
        );
        Ok(saved)
    }

    pub async fn confirm(&self, id: Uuid) -> AppResult<Booking> {
        self.transition(id, BookingAction::Confirm).await
    }

    pub async fn start(&self, id: Uuid) -> AppResult<Booking> {
        self.transition(id, BookingAction::Start).await
    }

    pub async fn complete(&self, id: Uuid, force: bool) -> AppResult<Booking> {
        self.transition(id, BookingAction::Complete { force }).await
    }

    pub async fn cancel(&self, id: Uuid, data: CancelBooking) -> AppResult<Booking> {
        data.validate()?;
        self.transition(id, BookingAction::Cancel { reason: data.reason }).await
    }

    pub async fn mark_no_show(&self, id: Uuid) -> AppResult<Booking> {
        self.transition(id, BookingAction::MarkNoShow).await
    }

    pub async fn assign_staff(&self, id: Uuid, staff_id: Uuid) -> AppResult<Booking> {
        self.transition(id, BookingAction::AssignStaff { staff_id }).await
    }

    pub async fn reschedule(&self, id: Uuid, interval: TimeInterval) -> AppResult<Booking> {
        self.transition(id, BookingAction::Reschedule { interval }).await
    }
}
