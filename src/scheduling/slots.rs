//! Slot generation.
//!
//! A [`SlotPlan`] holds everything needed to enumerate bookable slots for
//! one staff member. [`SlotPlan::iter`] walks the date range one day at a
//! time, so taking the first few slots of a long range only resolves the
//! days it needs. Calling `iter` again restarts from the first slot.

use std::collections::VecDeque;
use std::iter::{FusedIterator, Peekable};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::calendar::{merge, subtract_all, DateRange, TimeInterval};
use super::resolver::StaffSchedule;
use crate::error::{AppError, AppResult};

/// A bookable interval for a specific staff member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Slot {
    pub interval: TimeInterval,
    pub staff_id: Uuid,
}

pub struct SlotPlan<'a> {
    schedule: StaffSchedule<'a>,
    staff_id: Uuid,
    busy: Vec<TimeInterval>,
    range: DateRange,
    length: Duration,
    not_before: Option<DateTime<Utc>>,
}

impl<'a> SlotPlan<'a> {
    /// `busy` holds the intervals of bookings that still hold time
    pub fn new(
        schedule: StaffSchedule<'a>,
        staff_id: Uuid,
        busy: &[TimeInterval],
        range: DateRange,
        length: Duration,
    ) -> AppResult<Self> {
        if length <= Duration::zero() {
            return Err(AppError::InvalidInterval(format!(
                "slot length must be positive, got {} minutes",
                length.num_minutes()
            )));
        }
        Ok(Self {
            schedule,
            staff_id,
            busy: merge(busy),
            range,
            length,
            not_before: None,
        })
    }

    /// Skip slots that start before `instant`
    pub fn not_before(mut self, instant: DateTime<Utc>) -> Self {
        self.not_before = Some(instant);
        self
    }

    pub fn iter(&self) -> Slots<'_> {
        Slots {
            plan: self,
            days: Box::new(self.range.days()),
            free: VecDeque::new(),
        }
    }

    /// Free sub-intervals of one day after removing busy time
    fn free_on(&self, date: NaiveDate) -> Vec<TimeInterval> {
        let open = self.schedule.open_intervals(date);
        if open.is_empty() {
            return open;
        }
        subtract_all(&open, &self.busy)
    }
}

/// Lazy, ordered slot sequence of one [`SlotPlan`]
pub struct Slots<'p> {
    plan: &'p SlotPlan<'p>,
    days: Box<dyn Iterator<Item = NaiveDate> + 'p>,
    free: VecDeque<TimeInterval>,
}

impl Iterator for Slots<'_> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let length = self.plan.length;
        loop {
            let Some(room) = self.free.front().copied() else {
                let date = self.days.next()?;
                self.free.extend(self.plan.free_on(date));
                continue;
            };

            let start = room.start();
            let end = start + length;
            if end > room.end() {
                self.free.pop_front();
                continue;
            }

            // Advance the cursor by shrinking the front sub-interval
            self.free.pop_front();
            if let Ok(rest) = TimeInterval::new(end, room.end()) {
                self.free.push_front(rest);
            }

            if matches!(self.plan.not_before, Some(t) if start < t) {
                continue;
            }
            let interval = TimeInterval::new(start, end).ok()?;
            return Some(Slot { interval, staff_id: self.plan.staff_id });
        }
    }
}

impl FusedIterator for Slots<'_> {}

/// Merge per-staff slot streams into one stream ordered by start time,
/// ties broken by staff id
pub struct MergedSlots<I: Iterator<Item = Slot>> {
    streams: Vec<Peekable<I>>,
}

pub fn merge_by_start<I: Iterator<Item = Slot>>(streams: impl IntoIterator<Item = I>) -> MergedSlots<I> {
    MergedSlots {
        streams: streams.into_iter().map(Iterator::peekable).collect(),
    }
}

impl<I: Iterator<Item = Slot>> Iterator for MergedSlots<I> {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let mut best: Option<(usize, (DateTime<Utc>, Uuid))> = None;
        for (idx, stream) in self.streams.iter_mut().enumerate() {
            if let Some(slot) = stream.peek() {
                let key = (slot.interval.start(), slot.staff_id);
                if best.map_or(true, |(_, k)| key < k) {
                    best = Some((idx, key));
                }
            }
        }
        let (idx, _) = best?;
        self.streams[idx].next()
    }
}
