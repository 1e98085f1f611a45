//! Staff schedule resolution: effective hours minus personal time off.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use uuid::Uuid;

use super::calendar::{local_date, merge, subtract_all, DateRange, TimeInterval};
use super::hours::ProviderAvailability;

/// Open time of one staff member (or the provider as a whole when
/// `staff_id` is `None`), built from a point-in-time snapshot.
#[derive(Debug, Clone)]
pub struct StaffSchedule<'a> {
    availability: &'a ProviderAvailability,
    staff_id: Option<Uuid>,
    time_off: Vec<TimeInterval>,
}

impl<'a> StaffSchedule<'a> {
    pub fn new(
        availability: &'a ProviderAvailability,
        staff_id: Option<Uuid>,
        time_off: &[TimeInterval],
    ) -> Self {
        Self {
            availability,
            staff_id,
            time_off: merge(time_off),
        }
    }

    /// Ordered open intervals on `date`
    pub fn open_intervals(&self, date: NaiveDate) -> Vec<TimeInterval> {
        let open = self.availability.effective_hours(self.staff_id, date);
        if self.time_off.is_empty() {
            return open;
        }
        subtract_all(&open, &self.time_off)
    }

    /// Open intervals for every date in `range`
    pub fn resolve(&self, range: DateRange) -> BTreeMap<NaiveDate, Vec<TimeInterval>> {
        range
            .days()
            .map(|date| (date, self.open_intervals(date)))
            .collect()
    }

    /// Whether `interval` lies entirely inside open time. Intervals that
    /// run past local midnight are checked against both days.
    pub fn covers(&self, interval: &TimeInterval) -> bool {
        let tz = self.availability.time_zone;
        let first = local_date(interval.start(), tz);
        let last = local_date(interval.end() - Duration::nanoseconds(1), tz);
        let Ok(range) = DateRange::new(first, last) else {
            return false;
        };

        let open: Vec<TimeInterval> = range
            .days()
            .flat_map(|date| self.open_intervals(date))
            .collect();
        merge(&open).iter().any(|o| o.contains(interval))
    }
}
