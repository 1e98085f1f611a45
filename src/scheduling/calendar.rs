//! Calendar primitives: half-open instant intervals, wall-clock opening
//! hours and interval arithmetic.
//!
//! Instants are kept in UTC. Wall-clock times only become instants through
//! a provider's time zone, so a day that loses an hour to daylight saving
//! also loses it from every interval built on that day.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// TimeInterval
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` interval of instants, `start < end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = AppError;

    fn try_from(raw: RawInterval) -> AppResult<Self> {
        TimeInterval::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> AppResult<Self> {
        if start >= end {
            return Err(AppError::InvalidInterval(format!(
                "interval start {} must be before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Interval of `length` starting at `start`
    pub fn starting_at(start: DateTime<Utc>, length: Duration) -> AppResult<Self> {
        Self::new(start, start + length)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &TimeInterval) -> Option<TimeInterval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeInterval { start, end })
    }

    /// Parts of `self` not covered by `other` (zero, one or two intervals)
    pub fn subtract(&self, other: &TimeInterval) -> Vec<TimeInterval> {
        if !self.overlaps(other) {
            return vec![*self];
        }
        let mut rest = Vec::with_capacity(2);
        if self.start < other.start {
            rest.push(TimeInterval { start: self.start, end: other.start });
        }
        if other.end < self.end {
            rest.push(TimeInterval { start: other.end, end: self.end });
        }
        rest
    }

    /// Render in a local zone
    pub fn in_zone(&self, tz: Tz) -> (DateTime<Tz>, DateTime<Tz>) {
        (self.start.with_timezone(&tz), self.end.with_timezone(&tz))
    }
}

/// Minimal disjoint, ordered cover of `intervals`; touching intervals are joined
pub fn merge(intervals: &[TimeInterval]) -> Vec<TimeInterval> {
    let mut sorted = intervals.to_vec();
    sorted.sort();

    let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
    for interval in sorted {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Remove every interval of `cut` from `base`. Both sides are merged first.
pub fn subtract_all(base: &[TimeInterval], cut: &[TimeInterval]) -> Vec<TimeInterval> {
    let cut = merge(cut);
    let mut remaining = merge(base);
    for c in &cut {
        remaining = remaining.iter().flat_map(|r| r.subtract(c)).collect();
    }
    remaining
}

// ---------------------------------------------------------------------------
// Wall-clock hours
// ---------------------------------------------------------------------------

const MINUTES_PER_DAY: u32 = 24 * 60;

/// Opening span on the wall clock. A close of 00:00 means end of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalHours {
    open: NaiveTime,
    close: NaiveTime,
}

impl LocalHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> AppResult<Self> {
        let hours = Self { open, close };
        let (from, to) = hours.minutes();
        if from >= to {
            return Err(AppError::InvalidInterval(format!(
                "opening time {} must be before closing time {}",
                open.format("%H:%M"),
                close.format("%H:%M")
            )));
        }
        Ok(hours)
    }

    /// Parse `HH:MM` pairs; `24:00` is accepted as a closing time
    pub fn parse(open: &str, close: &str) -> AppResult<Self> {
        let open = parse_clock(open)?;
        let close = if close == "24:00" {
            NaiveTime::MIN
        } else {
            parse_clock(close)?
        };
        Self::new(open, close)
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    /// Minutes from midnight as `[from, to)`
    pub fn minutes(&self) -> (u32, u32) {
        let from = minute_of_day(self.open);
        let to = match minute_of_day(self.close) {
            0 => MINUTES_PER_DAY,
            m => m,
        };
        (from, to)
    }

    pub fn overlaps(&self, other: &LocalHours) -> bool {
        let (a0, a1) = self.minutes();
        let (b0, b1) = other.minutes();
        a0 < b1 && b0 < a1
    }

    /// Instants these hours cover on `date` in `tz`; `None` if the whole
    /// span falls into a daylight-saving gap.
    pub fn on(&self, date: NaiveDate, tz: Tz) -> Option<TimeInterval> {
        let start = to_instant(tz, date.and_time(self.open), Boundary::Opening);
        let close_day = if self.minutes().1 == MINUTES_PER_DAY {
            date.succ_opt()?
        } else {
            date
        };
        let end = to_instant(tz, close_day.and_time(self.close), Boundary::Closing);
        TimeInterval::new(start, end).ok()
    }

    pub fn label(&self) -> (String, String) {
        let close = if self.minutes().1 == MINUTES_PER_DAY {
            "24:00".to_string()
        } else {
            self.close.format("%H:%M").to_string()
        };
        (self.open.format("%H:%M").to_string(), close)
    }
}

/// Sort `hours` and reject overlapping entries
pub fn normalize_hours(mut hours: Vec<LocalHours>) -> AppResult<Vec<LocalHours>> {
    hours.sort_by_key(|h| h.minutes());
    for pair in hours.windows(2) {
        if pair[0].overlaps(&pair[1]) {
            let (a_open, a_close) = pair[0].label();
            let (b_open, b_close) = pair[1].label();
            return Err(AppError::InvalidInterval(format!(
                "opening hours {}-{} and {}-{} overlap",
                a_open, a_close, b_open, b_close
            )));
        }
    }
    Ok(hours)
}

fn parse_clock(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| AppError::Validation(format!("Invalid time '{}' (use HH:MM)", value)))
}

fn minute_of_day(t: NaiveTime) -> u32 {
    use chrono::Timelike;
    t.hour() * 60 + t.minute()
}

/// Which side of an interval a wall-clock time bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Opening,
    Closing,
}

/// Map a wall-clock time in `tz` to an instant.
///
/// Times inside a spring-forward gap move to the first instant after the
/// gap. Ambiguous fall-back times take the earlier instant when opening and
/// the later one when closing.
pub fn to_instant(tz: Tz, local: NaiveDateTime, boundary: Boundary) -> DateTime<Utc> {
    let mut probe = local;
    loop {
        match tz.from_local_datetime(&probe) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(early, late) => {
                let chosen = match boundary {
                    Boundary::Opening => early,
                    Boundary::Closing => late,
                };
                return chosen.with_timezone(&Utc);
            }
            LocalResult::None => {
                // Gaps end on a whole minute; step until we leave the gap.
                probe += Duration::minutes(1);
            }
        }
    }
}

/// Local-midnight-to-midnight window of `date` in `tz`
pub fn day_window(date: NaiveDate, tz: Tz) -> TimeInterval {
    let start = to_instant(tz, date.and_time(NaiveTime::MIN), Boundary::Opening);
    let next = date.succ_opt().unwrap_or(date);
    let end = to_instant(tz, next.and_time(NaiveTime::MIN), Boundary::Opening);
    TimeInterval { start, end: end.max(start + Duration::minutes(1)) }
}

/// Weekday index, 0 = Monday .. 6 = Sunday
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_monday() as u8
}

/// Local calendar date of an instant
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

// ---------------------------------------------------------------------------
// DateRange
// ---------------------------------------------------------------------------

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        if end < start {
            return Err(AppError::Validation(format!(
                "end date {} is before start date {}",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + Clone {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    /// Instants covered by the whole range in `tz`
    pub fn window(&self, tz: Tz) -> TimeInterval {
        let first = day_window(self.start, tz);
        let last = day_window(self.end, tz);
        TimeInterval { start: first.start, end: last.end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    fn iv(a: (u32, u32), b: (u32, u32)) -> TimeInterval {
        TimeInterval::new(at(a.0, a.1), at(b.0, b.1)).unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(matches!(
            TimeInterval::new(at(9, 0), at(9, 0)),
            Err(AppError::InvalidInterval(_))
        ));
        assert!(TimeInterval::new(at(10, 0), at(9, 0)).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"start":"2026-10-19T10:00:00Z","end":"2026-10-19T09:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeInterval>(bad).is_err());
        let good = r#"{"start":"2026-10-19T09:00:00Z","end":"2026-10-19T10:00:00Z"}"#;
        assert_eq!(serde_json::from_str::<TimeInterval>(good).unwrap(), iv((9, 0), (10, 0)));
    }

    #[test]
    fn test_half_open_overlap() {
        assert!(!iv((9, 0), (10, 0)).overlaps(&iv((10, 0), (11, 0))));
        assert!(iv((9, 0), (10, 1)).overlaps(&iv((10, 0), (11, 0))));
    }

    #[test]
    fn test_subtract_splits_in_two() {
        let rest = iv((9, 0), (12, 0)).subtract(&iv((10, 0), (10, 30)));
        assert_eq!(rest, vec![iv((9, 0), (10, 0)), iv((10, 30), (12, 0))]);
    }

    #[test]
    fn test_subtract_full_cover_leaves_nothing() {
        assert!(iv((9, 0), (10, 0)).subtract(&iv((8, 0), (11, 0))).is_empty());
    }

    #[test]
    fn test_intersect() {
        assert_eq!(
            iv((9, 0), (12, 0)).intersect(&iv((11, 0), (13, 0))),
            Some(iv((11, 0), (12, 0)))
        );
        assert_eq!(iv((9, 0), (10, 0)).intersect(&iv((10, 0), (11, 0))), None);
    }

    #[test]
    fn test_merge_joins_touching_and_overlapping() {
        let merged = merge(&[iv((13, 0), (14, 0)), iv((9, 0), (10, 0)), iv((10, 0), (11, 0)), iv((10, 30), (12, 0))]);
        assert_eq!(merged, vec![iv((9, 0), (12, 0)), iv((13, 0), (14, 0))]);
    }

    #[test]
    fn test_subtract_all() {
        let rest = subtract_all(
            &[iv((9, 0), (12, 0)), iv((13, 0), (17, 0))],
            &[iv((11, 0), (14, 0)), iv((16, 0), (16, 30))],
        );
        assert_eq!(
            rest,
            vec![iv((9, 0), (11, 0)), iv((14, 0), (16, 0)), iv((16, 30), (17, 0))]
        );
    }

    #[test]
    fn test_local_hours_validation() {
        assert!(LocalHours::parse("09:00", "17:00").is_ok());
        assert!(LocalHours::parse("18:00", "24:00").is_ok());
        assert!(matches!(LocalHours::parse("17:00", "09:00"), Err(AppError::InvalidInterval(_))));
        assert!(matches!(LocalHours::parse("9h", "17:00"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_normalize_rejects_overlap() {
        let hours = vec![
            LocalHours::parse("13:00", "17:00").unwrap(),
            LocalHours::parse("09:00", "12:00").unwrap(),
        ];
        let sorted = normalize_hours(hours).unwrap();
        assert_eq!(sorted[0].label().0, "09:00");

        let clash = vec![
            LocalHours::parse("09:00", "13:00").unwrap(),
            LocalHours::parse("12:00", "17:00").unwrap(),
        ];
        assert!(normalize_hours(clash).is_err());
    }

    #[test]
    fn test_spring_forward_day_is_shorter() {
        // 2026-03-08 02:00 America/New_York jumps to 03:00
        let tz: Tz = "America/New_York".parse().unwrap();
        let date = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let hours = LocalHours::parse("00:00", "04:00").unwrap();
        let interval = hours.on(date, tz).unwrap();
        assert_eq!(interval.duration(), Duration::hours(3));
    }

    #[test]
    fn test_gap_time_moves_past_gap() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let local = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap().and_hms_opt(2, 30, 0).unwrap();
        let instant = to_instant(tz, local, Boundary::Opening);
        assert_eq!(instant, Utc.with_ymd_and_hms(2026, 3, 8, 7, 0, 0).unwrap());
    }

    #[test]
    fn test_ambiguous_time_depends_on_boundary() {
        // 2026-11-01 01:30 happens twice in New York
        let tz: Tz = "America/New_York".parse().unwrap();
        let local = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap().and_hms_opt(1, 30, 0).unwrap();
        let open = to_instant(tz, local, Boundary::Opening);
        let close = to_instant(tz, local, Boundary::Closing);
        assert_eq!(close - open, Duration::hours(1));
    }

    #[test]
    fn test_date_range() {
        let start = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        let range = DateRange::new(start, end).unwrap();
        assert_eq!(range.len_days(), 3);
        assert_eq!(range.days().count(), 3);
        assert!(DateRange::new(end, start).is_err());
    }
}
