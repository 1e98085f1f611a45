//! Provider availability service: hours administration, effective hours
//! and slot queries

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::SchedulingConfig,
    error::{AppError, AppResult},
    models::{
        availability::{
            parse_date, parse_time_zone, CreateDayException, CreateHoliday, EffectiveHoursQuery,
            DayScheduleResponse, EffectiveHoursResponse, LocalInterval, RegisterProvider, SlotQuery,
            SlotResponse, StaffScheduleQuery, UpdateBusinessHours,
        },
        ServiceSpec,
    },
    repository::{Repository, StoreError},
    scheduling::{
        merge_by_start, DateRange, ProviderAvailability, SlotPlan, StaffSchedule, TimeInterval,
    },
    services::{clock::Clock, guard::RetryPolicy},
};

/// Inputs of one staff member's slot plan, loaded before planning starts
struct StaffSnapshot {
    staff_id: Uuid,
    time_off: Vec<TimeInterval>,
    busy: Vec<TimeInterval>,
}

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
    retry: RetryPolicy,
}

impl AvailabilityService {
    pub fn new(
        repository: Repository,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            clock,
            config,
            retry,
        }
    }

    // ---- Aggregate commands ----

    /// Register a provider with empty availability
    pub async fn register_provider(&self, data: RegisterProvider) -> AppResult<ProviderAvailability> {
        data.validate()?;
        let time_zone = parse_time_zone(&data.time_zone)?;
        let mut availability = ProviderAvailability::new(data.provider_id, time_zone);
        self.repository.availability.create(&availability).await?;
        availability.version = 1;
        tracing::info!("Registered provider {} in {}", data.provider_id, time_zone.name());
        Ok(availability)
    }

    pub async fn get(&self, provider_id: Uuid) -> AppResult<ProviderAvailability> {
        self.repository
            .availability
            .load(provider_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Provider {} not found", provider_id)))
    }

    /// Round trip to the availability store
    pub async fn probe(&self) -> AppResult<()> {
        self.repository.availability.load(Uuid::nil()).await?;
        Ok(())
    }

    /// Load, change and save the aggregate, starting over when another
    /// writer saved in between
    async fn modify<T>(
        &self,
        provider_id: Uuid,
        change: impl Fn(&mut ProviderAvailability) -> AppResult<T>,
    ) -> AppResult<(ProviderAvailability, T)> {
        let mut attempt = 1;
        loop {
            let mut availability = self.get(provider_id).await?;
            let output = change(&mut availability)?;
            match self.repository.availability.save(&availability).await {
                Ok(version) => {
                    availability.version = version;
                    return Ok((availability, output));
                }
                Err(StoreError::VersionMismatch | StoreError::Transient(_))
                    if attempt < self.retry.max_attempts =>
                {
                    tracing::debug!(
                        "Availability of provider {} changed while saving, retrying (attempt {})",
                        provider_id,
                        attempt
                    );
                    tokio::time::sleep(self.retry.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(StoreError::Transient(msg)) => {
                    return Err(AppError::Conflict(format!(
                        "Availability of provider {} could not be saved: {}",
                        provider_id, msg
                    )))
                }
                Err(err) => return Err(err.into()),
            }
        }
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

    pub async fn update_business_hours(
        &self,
        provider_id: Uuid,
        data: UpdateBusinessHours,
    ) -> AppResult<ProviderAvailability> {
        let hours = data.weekly_hours()?;
        if let Some(staff_id) = data.staff_id {
            self.ensure_staff(provider_id, staff_id).await?;
        }
        let (availability, _) = self
            .modify(provider_id, |a| {
                a.update_business_hours(data.staff_id, hours.clone());
                Ok(())
            })
            .await?;
        tracing::info!(
            "Business hours of provider {} updated (staff: {:?})",
            provider_id,
            data.staff_id
        );
        Ok(availability)
    }

    pub async fn add_holiday(&self, provider_id: Uuid, data: CreateHoliday) -> AppResult<Uuid> {
        data.validate()?;
        let rule = data.rule()?;
        let (_, id) = self
            .modify(provider_id, |a| a.add_holiday(rule, data.label.clone()))
            .await?;
        tracing::info!("Holiday {} added for provider {}", id, provider_id);
        Ok(id)
    }

    pub async fn delete_holiday(&self, provider_id: Uuid, holiday_id: Uuid) -> AppResult<()> {
        self.modify(provider_id, |a| a.delete_holiday(holiday_id)).await?;
        Ok(())
    }

    pub async fn add_exception(&self, provider_id: Uuid, data: CreateDayException) -> AppResult<Uuid> {
        let (date, kind) = data.parse()?;
        if let Some(staff_id) = data.staff_id {
            self.ensure_staff(provider_id, staff_id).await?;
        }
        let (_, id) = self
            .modify(provider_id, |a| a.add_exception(data.staff_id, date, kind.clone()))
            .await?;
        tracing::info!(
            "Day exception {} on {} added for provider {} (staff: {:?})",
            id,
            date,
            provider_id,
            data.staff_id
        );
        Ok(id)
    }

    pub async fn delete_exception(&self, provider_id: Uuid, exception_id: Uuid) -> AppResult<()> {
        self.modify(provider_id, |a| a.delete_exception(exception_id)).await?;
        Ok(())
    }

    // ---- Queries ----

    /// Hours in force on one date after precedence is applied
    pub async fn effective_hours(
        &self,
        provider_id: Uuid,
        query: EffectiveHoursQuery,
    ) -> AppResult<EffectiveHoursResponse> {
        let date = parse_date(&query.date, "date")?;
        let availability = self.get(provider_id).await?;
        let (source, _) = availability.local_hours(query.staff_id, date);
        let intervals = availability
            .effective_hours(query.staff_id, date)
            .iter()
            .map(|i| LocalInterval::new(i, availability.time_zone))
            .collect();
        Ok(EffectiveHoursResponse {
            date,
            staff_id: query.staff_id,
            source,
            intervals,
        })
    }

    /// Open intervals of a staff member per date, time off removed
    pub async fn staff_schedule(
        &self,
        provider_id: Uuid,
        staff_id: Uuid,
        query: StaffScheduleQuery,
    ) -> AppResult<Vec<DayScheduleResponse>> {
        let start = parse_date(&query.start_date, "start_date")?;
        let end = parse_date(&query.end_date, "end_date")?;
        let range = self.checked_range(start, end)?;
        self.ensure_staff(provider_id, staff_id).await?;
        let availability = self.get(provider_id).await?;
        let tz = availability.time_zone;
        let time_off = self
            .repository
            .staff
            .get_staff_time_off(staff_id, range.window(tz))
            .await?;

        let schedule = StaffSchedule::new(&availability, Some(staff_id), &time_off);
        Ok(schedule
            .resolve(range)
            .into_iter()
            .map(|(date, open)| DayScheduleResponse {
                date,
                intervals: open.iter().map(|i| LocalInterval::new(i, tz)).collect(),
            })
            .collect())
    }

    fn checked_range(&self, start: NaiveDate, end: NaiveDate) -> AppResult<DateRange> {
        let range = DateRange::new(start, end)?;
        if range.len_days() > self.config.max_range_days {
            return Err(AppError::Validation(format!(
                "Date range of {} days exceeds the maximum of {}",
                range.len_days(),
                self.config.max_range_days
            )));
        }
        Ok(range)
    }

    async fn service_for(&self, provider_id: Uuid, service_id: Uuid) -> AppResult<ServiceSpec> {
        match self.repository.catalog.get_service(service_id).await? {
            Some(service) if service.provider_id == provider_id => Ok(service),
            _ => Err(AppError::NotFound(format!(
                "Service {} not found for provider {}",
                service_id, provider_id
            ))),
        }
    }

    /// Bookable slots in start order, at most `limit` of them
    pub async fn available_slots(&self, provider_id: Uuid, query: SlotQuery) -> AppResult<Vec<SlotResponse>> {
        let start = parse_date(&query.start_date, "start_date")?;
        let end = parse_date(&query.end_date, "end_date")?;
        let range = self.checked_range(start, end)?;
        let limit = query.limit.unwrap_or(self.config.default_slot_limit);

        let service = self.service_for(provider_id, query.service_id).await?;
        let availability = self.get(provider_id).await?;
        let staff_ids = match query.staff_id {
            Some(staff_id) => {
                self.ensure_staff(provider_id, staff_id).await?;
                vec![staff_id]
            }
            None => self.repository.staff.list_staff(provider_id).await?,
        };

        let window = range.window(availability.time_zone);
        let mut snapshots = Vec::with_capacity(staff_ids.len());
        for staff_id in staff_ids {
            let time_off = self.repository.staff.get_staff_time_off(staff_id, window).await?;
            let busy = self
                .repository
                .bookings
                .overlapping(staff_id, window)
                .await?
                .into_iter()
                .map(|b| b.interval)
                .collect();
            snapshots.push(StaffSnapshot { staff_id, time_off, busy });
        }

        let slots = plan_slots(&availability, &snapshots, &service, range, self.clock.now(), limit)?;
        tracing::debug!(
            "{} slots for provider {} service {} between {} and {}",
            slots.len(),
            provider_id,
            service.id,
            start,
            end
        );
        Ok(slots)
    }
}

fn plan_slots(
    availability: &ProviderAvailability,
    snapshots: &[StaffSnapshot],
    service: &ServiceSpec,
    range: DateRange,
    now: chrono::DateTime<chrono::Utc>,
    limit: usize,
) -> AppResult<Vec<SlotResponse>> {
    let plans = snapshots
        .iter()
        .map(|s| {
            let schedule = StaffSchedule::new(availability, Some(s.staff_id), &s.time_off);
            SlotPlan::new(schedule, s.staff_id, &s.busy, range, service.slot_length())
                .map(|plan| plan.not_before(now))
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(merge_by_start(plans.iter().map(SlotPlan::iter))
        .take(limit)
        .map(|slot| SlotResponse::new(&slot, availability.time_zone))
        .collect())
}
