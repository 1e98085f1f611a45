//! Business hours, holidays and day exceptions for one provider.
//!
//! [`ProviderAvailability`] is the aggregate root. It is only changed
//! through its command methods, and answers "when is this provider (or this
//! staff member) open on a date" with [`ProviderAvailability::effective_hours`].

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::calendar::{normalize_hours, weekday_index, LocalHours, TimeInterval};
use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// WeeklyHours
// ---------------------------------------------------------------------------

/// Recurring weekly opening hours, keyed by weekday (0 = Monday)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyHours {
    days: BTreeMap<u8, Vec<LocalHours>>,
}

impl WeeklyHours {
    pub fn new(entries: impl IntoIterator<Item = (u8, LocalHours)>) -> AppResult<Self> {
        let mut grouped: BTreeMap<u8, Vec<LocalHours>> = BTreeMap::new();
        for (weekday, hours) in entries {
            if weekday > 6 {
                return Err(AppError::Validation(format!(
                    "day_of_week must be 0-6, got {}",
                    weekday
                )));
            }
            grouped.entry(weekday).or_default().push(hours);
        }

        let mut days = BTreeMap::new();
        for (weekday, hours) in grouped {
            days.insert(weekday, normalize_hours(hours)?);
        }
        Ok(Self { days })
    }

    /// Hours for a weekday, `None` if this schedule says nothing about it
    pub fn day(&self, weekday: u8) -> Option<&[LocalHours]> {
        self.days.get(&weekday).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (u8, &LocalHours)> {
        self.days
            .iter()
            .flat_map(|(day, hours)| hours.iter().map(move |h| (*day, h)))
    }
}

// ---------------------------------------------------------------------------
// Holidays
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HolidayRule {
    /// A single calendar date
    OneOff { date: NaiveDate },
    /// Same month and day every year
    Annual { month: u32, day: u32 },
}

impl HolidayRule {
    fn validate(&self) -> AppResult<()> {
        if let HolidayRule::Annual { month, day } = *self {
            // 2024 is a leap year, so Feb 29 is accepted
            NaiveDate::from_ymd_opt(2024, month, day).ok_or_else(|| {
                AppError::Validation(format!("invalid annual holiday {:02}-{:02}", month, day))
            })?;
        }
        Ok(())
    }

    /// Concrete date of this holiday in `year`, if it has one
    pub fn resolve(&self, year: i32) -> Option<NaiveDate> {
        match *self {
            HolidayRule::OneOff { date } => (date.year() == year).then_some(date),
            HolidayRule::Annual { month, day } => NaiveDate::from_ymd_opt(year, month, day),
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.resolve(date.year()) == Some(date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub id: Uuid,
    pub rule: HolidayRule,
    pub label: String,
}

// ---------------------------------------------------------------------------
// Day exceptions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExceptionKind {
    Closed,
    CustomHours(Vec<LocalHours>),
}

/// Single-date override, provider-wide when `staff_id` is `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayException {
    pub id: Uuid,
    pub staff_id: Option<Uuid>,
    pub date: NaiveDate,
    pub kind: ExceptionKind,
}

impl DayException {
    fn hours(&self) -> &[LocalHours] {
        match &self.kind {
            ExceptionKind::Closed => &[],
            ExceptionKind::CustomHours(hours) => hours,
        }
    }
}

/// Rule that decided a date's effective hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HoursSource {
    StaffException,
    ProviderException,
    Holiday,
    StaffHours,
    ProviderHours,
    Closed,
}

// ---------------------------------------------------------------------------
// ProviderAvailability
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProviderAvailability {
    pub provider_id: Uuid,
    pub time_zone: Tz,
    pub business_hours: WeeklyHours,
    pub staff_hours: BTreeMap<Uuid, WeeklyHours>,
    pub holidays: Vec<Holiday>,
    pub exceptions: Vec<DayException>,
    /// Optimistic concurrency token, bumped by the store on every save
    pub version: i64,
}

impl ProviderAvailability {
    pub fn new(provider_id: Uuid, time_zone: Tz) -> Self {
        Self {
            provider_id,
            time_zone,
            business_hours: WeeklyHours::default(),
            staff_hours: BTreeMap::new(),
            holidays: Vec::new(),
            exceptions: Vec::new(),
            version: 0,
        }
    }

    // ---- Commands ----

    /// Replace provider hours, or a staff override when `staff_id` is set.
    /// Empty hours for a staff member remove the override.
    pub fn update_business_hours(&mut self, staff_id: Option<Uuid>, hours: WeeklyHours) {
        match staff_id {
            None => self.business_hours = hours,
            Some(staff_id) if hours.is_empty() => {
                self.staff_hours.remove(&staff_id);
            }
            Some(staff_id) => {
                self.staff_hours.insert(staff_id, hours);
            }
        }
    }

    pub fn add_holiday(&mut self, rule: HolidayRule, label: String) -> AppResult<Uuid> {
        rule.validate()?;
        let id = Uuid::new_v4();
        self.holidays.push(Holiday { id, rule, label });
        Ok(id)
    }

    pub fn delete_holiday(&mut self, id: Uuid) -> AppResult<()> {
        let before = self.holidays.len();
        self.holidays.retain(|h| h.id != id);
        if self.holidays.len() == before {
            return Err(AppError::NotFound(format!("Holiday {} not found", id)));
        }
        Ok(())
    }

    /// Add an exception; an existing one for the same scope and date is replaced
    pub fn add_exception(
        &mut self,
        staff_id: Option<Uuid>,
        date: NaiveDate,
        kind: ExceptionKind,
    ) -> AppResult<Uuid> {
        let kind = match kind {
            ExceptionKind::Closed => ExceptionKind::Closed,
            ExceptionKind::CustomHours(hours) if hours.is_empty() => {
                return Err(AppError::Validation(
                    "custom hours exception needs at least one interval".to_string(),
                ))
            }
            ExceptionKind::CustomHours(hours) => ExceptionKind::CustomHours(normalize_hours(hours)?),
        };

        self.exceptions
            .retain(|e| !(e.staff_id == staff_id && e.date == date));
        let id = Uuid::new_v4();
        self.exceptions.push(DayException { id, staff_id, date, kind });
        Ok(id)
    }

    pub fn delete_exception(&mut self, id: Uuid) -> AppResult<()> {
        let before = self.exceptions.len();
        self.exceptions.retain(|e| e.id != id);
        if self.exceptions.len() == before {
            return Err(AppError::NotFound(format!("Day exception {} not found", id)));
        }
        Ok(())
    }

    // ---- Queries ----

    fn exception_for(&self, staff_id: Option<Uuid>, date: NaiveDate) -> Option<&DayException> {
        self.exceptions
            .iter()
            .find(|e| e.staff_id == staff_id && e.date == date)
    }

    /// Wall-clock hours for a date and the rule that produced them.
    ///
    /// First match wins: staff exception, provider exception, holiday,
    /// staff weekly override, provider weekly hours.
    pub fn local_hours(&self, staff_id: Option<Uuid>, date: NaiveDate) -> (HoursSource, Vec<LocalHours>) {
        if let Some(staff_id) = staff_id {
            if let Some(exception) = self.exception_for(Some(staff_id), date) {
                return (HoursSource::StaffException, exception.hours().to_vec());
            }
        }
        if let Some(exception) = self.exception_for(None, date) {
            return (HoursSource::ProviderException, exception.hours().to_vec());
        }
        if self.holidays.iter().any(|h| h.rule.covers(date)) {
            return (HoursSource::Holiday, Vec::new());
        }

        let weekday = weekday_index(date);
        if let Some(hours) = staff_id
            .and_then(|id| self.staff_hours.get(&id))
            .and_then(|week| week.day(weekday))
        {
            return (HoursSource::StaffHours, hours.to_vec());
        }
        match self.business_hours.day(weekday) {
            Some(hours) => (HoursSource::ProviderHours, hours.to_vec()),
            None => (HoursSource::Closed, Vec::new()),
        }
    }

    /// Ordered open intervals for a date, in instants
    pub fn effective_hours(&self, staff_id: Option<Uuid>, date: NaiveDate) -> Vec<TimeInterval> {
        let (_, hours) = self.local_hours(staff_id, date);
        hours
            .iter()
            .filter_map(|h| h.on(date, self.time_zone))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hours(open: &str, close: &str) -> LocalHours {
        LocalHours::parse(open, close).unwrap()
    }

    /// Tehran provider open Monday-Friday 09:00-17:00
    fn provider() -> ProviderAvailability {
        let tz: Tz = "Asia/Tehran".parse().unwrap();
        let mut availability = ProviderAvailability::new(Uuid::new_v4(), tz);
        let week = WeeklyHours::new((0..5).map(|d| (d, hours("09:00", "17:00")))).unwrap();
        availability.update_business_hours(None, week);
        availability
    }

    fn monday() -> NaiveDate {
        date(2026, 10, 19)
    }

    #[test]
    fn test_weekly_hours_rejects_bad_weekday() {
        assert!(WeeklyHours::new([(7, hours("09:00", "10:00"))]).is_err());
    }

    #[test]
    fn test_split_shift_sorted() {
        let week = WeeklyHours::new([(0, hours("14:00", "18:00")), (0, hours("08:00", "12:00"))]).unwrap();
        let day = week.day(0).unwrap();
        assert_eq!(day[0].label().0, "08:00");
        assert_eq!(day[1].label().0, "14:00");
    }

    #[test]
    fn test_provider_hours_apply() {
        let availability = provider();
        let (source, local) = availability.local_hours(None, monday());
        assert_eq!(source, HoursSource::ProviderHours);
        assert_eq!(local.len(), 1);

        let open = availability.effective_hours(None, monday());
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].duration(), chrono::Duration::hours(8));
    }

    #[test]
    fn test_closed_by_default() {
        let availability = provider();
        // Sunday
        let (source, local) = availability.local_hours(None, date(2026, 10, 25));
        assert_eq!(source, HoursSource::Closed);
        assert!(local.is_empty());
    }

    #[test]
    fn test_staff_closed_exception_beats_provider_hours() {
        let mut availability = provider();
        let staff = Uuid::new_v4();
        availability.add_exception(Some(staff), monday(), ExceptionKind::Closed).unwrap();

        assert!(availability.effective_hours(Some(staff), monday()).is_empty());
        assert_eq!(availability.effective_hours(None, monday()).len(), 1);
        assert_eq!(availability.effective_hours(Some(Uuid::new_v4()), monday()).len(), 1);
    }

    #[test]
    fn test_holiday_closes_everyone_unless_staff_exception_reopens() {
        let mut availability = provider();
        let staff = Uuid::new_v4();
        let other = Uuid::new_v4();
        availability
            .add_holiday(HolidayRule::OneOff { date: monday() }, "Founders day".into())
            .unwrap();

        assert!(availability.effective_hours(Some(staff), monday()).is_empty());

        availability
            .add_exception(
                Some(staff),
                monday(),
                ExceptionKind::CustomHours(vec![hours("10:00", "12:00")]),
            )
            .unwrap();
        let (source, _) = availability.local_hours(Some(staff), monday());
        assert_eq!(source, HoursSource::StaffException);
        assert_eq!(availability.effective_hours(Some(staff), monday()).len(), 1);
        assert!(availability.effective_hours(Some(other), monday()).is_empty());
    }

    #[test]
    fn test_provider_exception_beats_holiday() {
        let mut availability = provider();
        availability
            .add_holiday(HolidayRule::OneOff { date: monday() }, "Closed".into())
            .unwrap();
        availability
            .add_exception(None, monday(), ExceptionKind::CustomHours(vec![hours("09:00", "11:00")]))
            .unwrap();
        let (source, local) = availability.local_hours(None, monday());
        assert_eq!(source, HoursSource::ProviderException);
        assert_eq!(local, vec![hours("09:00", "11:00")]);
    }

    #[test]
    fn test_staff_override_is_not_merged_with_provider_hours() {
        let mut availability = provider();
        let staff = Uuid::new_v4();
        let week = WeeklyHours::new([(0, hours("12:00", "14:00"))]).unwrap();
        availability.update_business_hours(Some(staff), week);

        let (source, local) = availability.local_hours(Some(staff), monday());
        assert_eq!(source, HoursSource::StaffHours);
        assert_eq!(local, vec![hours("12:00", "14:00")]);

        // Tuesday is not in the override, provider hours apply
        let (source, _) = availability.local_hours(Some(staff), date(2026, 10, 20));
        assert_eq!(source, HoursSource::ProviderHours);

        availability.update_business_hours(Some(staff), WeeklyHours::default());
        assert!(availability.staff_hours.is_empty());
    }

    #[test]
    fn test_annual_holiday_recurs() {
        let mut availability = provider();
        availability
            .add_holiday(HolidayRule::Annual { month: 10, day: 19 }, "Anniversary".into())
            .unwrap();
        assert_eq!(availability.local_hours(None, monday()).0, HoursSource::Holiday);
        // 2027-10-19 is a Tuesday
        assert_eq!(
            availability.local_hours(None, date(2027, 10, 19)).0,
            HoursSource::Holiday
        );
    }

    #[test]
    fn test_leap_day_holiday_only_in_leap_years() {
        let rule = HolidayRule::Annual { month: 2, day: 29 };
        assert!(rule.validate().is_ok());
        assert_eq!(rule.resolve(2027), None);
        assert_eq!(rule.resolve(2028), Some(date(2028, 2, 29)));
        assert!(HolidayRule::Annual { month: 2, day: 30 }.validate().is_err());
    }

    #[test]
    fn test_exception_upsert_and_delete() {
        let mut availability = provider();
        let first = availability.add_exception(None, monday(), ExceptionKind::Closed).unwrap();
        let second = availability
            .add_exception(None, monday(), ExceptionKind::CustomHours(vec![hours("10:00", "11:00")]))
            .unwrap();
        assert_eq!(availability.exceptions.len(), 1);
        assert!(matches!(availability.delete_exception(first), Err(AppError::NotFound(_))));
        availability.delete_exception(second).unwrap();
        assert!(availability.exceptions.is_empty());
    }

    #[test]
    fn test_delete_unknown_holiday() {
        let mut availability = provider();
        assert!(matches!(
            availability.delete_holiday(Uuid::new_v4()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_empty_custom_hours_rejected() {
        let mut availability = provider();
        assert!(availability
            .add_exception(None, monday(), ExceptionKind::CustomHours(vec![]))
            .is_err());
    }
}
