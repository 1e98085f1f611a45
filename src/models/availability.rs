//! Availability request/response models (business hours, holidays,
//! exceptions, effective hours, slots)

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    scheduling::{
        ExceptionKind, HolidayRule, HoursSource, LocalHours, ProviderAvailability, Slot, TimeInterval,
        WeeklyHours,
    },
};

// ---------------------------------------------------------------------------
// Provider registration
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterProvider {
    pub provider_id: Uuid,
    /// IANA time zone, e.g. "Asia/Tehran"
    #[validate(length(min = 1, max = 64))]
    pub time_zone: String,
}

pub fn parse_time_zone(name: &str) -> AppResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| AppError::Validation(format!("Unknown time zone '{}'", name)))
}

// ---------------------------------------------------------------------------
// Business hours
// ---------------------------------------------------------------------------

/// Opening span on the wall clock
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HoursRange {
    /// Opening time (HH:MM)
    pub open_time: String,
    /// Closing time (HH:MM, 24:00 for midnight)
    pub close_time: String,
}

impl HoursRange {
    fn parse(&self) -> AppResult<LocalHours> {
        LocalHours::parse(&self.open_time, &self.close_time)
    }
}

impl From<&LocalHours> for HoursRange {
    fn from(hours: &LocalHours) -> Self {
        let (open_time, close_time) = hours.label();
        Self { open_time, close_time }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BusinessHoursEntry {
    /// Day of week (0=Monday, 6=Sunday)
    pub day_of_week: u8,
    #[serde(flatten)]
    pub hours: HoursRange,
}

/// Replace weekly hours of the provider, or of one staff member
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBusinessHours {
    /// Staff override target; provider-wide hours when absent
    pub staff_id: Option<Uuid>,
    pub hours: Vec<BusinessHoursEntry>,
}

impl UpdateBusinessHours {
    pub fn weekly_hours(&self) -> AppResult<WeeklyHours> {
        let entries = self
            .hours
            .iter()
            .map(|e| Ok((e.day_of_week, e.hours.parse()?)))
            .collect::<AppResult<Vec<_>>>()?;
        WeeklyHours::new(entries)
    }
}

fn week_entries(week: &WeeklyHours) -> Vec<BusinessHoursEntry> {
    week.entries()
        .map(|(day_of_week, hours)| BusinessHoursEntry {
            day_of_week,
            hours: hours.into(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Holidays
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateHoliday {
    #[validate(length(min = 1, max = 200))]
    pub label: String,
    /// Holiday date (YYYY-MM-DD)
    pub date: String,
    /// Repeat every year on the same month and day
    #[serde(default)]
    pub recurring: bool,
}

impl CreateHoliday {
    pub fn rule(&self) -> AppResult<HolidayRule> {
        let date = parse_date(&self.date, "date")?;
        Ok(if self.recurring {
            use chrono::Datelike;
            HolidayRule::Annual {
                month: date.month(),
                day: date.day(),
            }
        } else {
            HolidayRule::OneOff { date }
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HolidayResponse {
    pub id: Uuid,
    pub label: String,
    pub rule: HolidayRule,
}

// ---------------------------------------------------------------------------
// Day exceptions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDayException {
    /// Staff-level exception when set
    pub staff_id: Option<Uuid>,
    /// Exception date (YYYY-MM-DD)
    pub date: String,
    /// Closed all day; `hours` must be empty
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub hours: Vec<HoursRange>,
}

impl CreateDayException {
    pub fn parse(&self) -> AppResult<(NaiveDate, ExceptionKind)> {
        let date = parse_date(&self.date, "date")?;
        if self.closed {
            if !self.hours.is_empty() {
                return Err(AppError::Validation(
                    "a closed exception cannot carry hours".to_string(),
                ));
            }
            return Ok((date, ExceptionKind::Closed));
        }
        let hours = self
            .hours
            .iter()
            .map(HoursRange::parse)
            .collect::<AppResult<Vec<_>>>()?;
        Ok((date, ExceptionKind::CustomHours(hours)))
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DayExceptionResponse {
    pub id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub closed: bool,
    pub hours: Vec<HoursRange>,
}

// ---------------------------------------------------------------------------
// Aggregate view
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffHoursResponse {
    pub staff_id: Uuid,
    pub hours: Vec<BusinessHoursEntry>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    pub provider_id: Uuid,
    pub time_zone: String,
    pub business_hours: Vec<BusinessHoursEntry>,
    pub staff_hours: Vec<StaffHoursResponse>,
    pub holidays: Vec<HolidayResponse>,
    pub exceptions: Vec<DayExceptionResponse>,
    pub version: i64,
}

impl From<&ProviderAvailability> for AvailabilityResponse {
    fn from(a: &ProviderAvailability) -> Self {
        Self {
            provider_id: a.provider_id,
            time_zone: a.time_zone.name().to_string(),
            business_hours: week_entries(&a.business_hours),
            staff_hours: a
                .staff_hours
                .iter()
                .map(|(staff_id, week)| StaffHoursResponse {
                    staff_id: *staff_id,
                    hours: week_entries(week),
                })
                .collect(),
            holidays: a
                .holidays
                .iter()
                .map(|h| HolidayResponse {
                    id: h.id,
                    label: h.label.clone(),
                    rule: h.rule,
                })
                .collect(),
            exceptions: a
                .exceptions
                .iter()
                .map(|e| {
                    let (closed, hours) = match &e.kind {
                        ExceptionKind::Closed => (true, Vec::new()),
                        ExceptionKind::CustomHours(h) => (false, h.iter().map(HoursRange::from).collect()),
                    };
                    DayExceptionResponse {
                        id: e.id,
                        staff_id: e.staff_id,
                        date: e.date,
                        closed,
                        hours,
                    }
                })
                .collect(),
            version: a.version,
        }
    }
}

/// Identifier of a newly created holiday or exception
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedResponse {
    pub id: Uuid,
}

// ---------------------------------------------------------------------------
// Effective hours
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EffectiveHoursQuery {
    /// Date to resolve (YYYY-MM-DD)
    pub date: String,
    pub staff_id: Option<Uuid>,
}

/// Interval rendered in the provider's local time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LocalInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl LocalInterval {
    pub fn new(interval: &TimeInterval, tz: Tz) -> Self {
        let (start, end) = interval.in_zone(tz);
        Self {
            start: start.fixed_offset(),
            end: end.fixed_offset(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectiveHoursResponse {
    pub date: NaiveDate,
    pub staff_id: Option<Uuid>,
    /// Rule that decided the hours
    pub source: HoursSource,
    pub intervals: Vec<LocalInterval>,
}

// ---------------------------------------------------------------------------
// Staff schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct StaffScheduleQuery {
    /// First date (YYYY-MM-DD)
    pub start_date: String,
    /// Last date, inclusive (YYYY-MM-DD)
    pub end_date: String,
}

/// Open time of a staff member on one date, time off removed
#[derive(Debug, Serialize, ToSchema)]
pub struct DayScheduleResponse {
    pub date: NaiveDate,
    pub intervals: Vec<LocalInterval>,
}

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct SlotQuery {
    pub service_id: Uuid,
    /// Any staff member of the provider when absent
    pub staff_id: Option<Uuid>,
    /// First date (YYYY-MM-DD)
    pub start_date: String,
    /// Last date, inclusive (YYYY-MM-DD)
    pub end_date: String,
    /// Maximum number of slots
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SlotResponse {
    pub staff_id: Uuid,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl SlotResponse {
    pub fn new(slot: &Slot, tz: Tz) -> Self {
        let local = LocalInterval::new(&slot.interval, tz);
        Self {
            staff_id: slot.staff_id,
            start: local.start,
            end: local.end,
        }
    }
}

pub fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("Invalid {} (use YYYY-MM-DD)", field)))
}
