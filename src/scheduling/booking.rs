//! Booking aggregate and its lifecycle.
//!
//! Transitions are pure: [`Booking::apply`] returns the next state and the
//! domain event it produced, leaving the current value untouched. Checks
//! that need storage (overlap with other bookings, staff membership) happen
//! in the service layer before the new state is committed.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::calendar::TimeInterval;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Created,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Whether a booking in this status keeps its interval off the market
    pub fn holds_time(self) -> bool {
        self != BookingStatus::Cancelled
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Created => "created",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        Ok(match s {
            "created" => BookingStatus::Created,
            "confirmed" => BookingStatus::Confirmed,
            "in_progress" => BookingStatus::InProgress,
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            "no_show" => BookingStatus::NoShow,
            other => {
                return Err(AppError::Internal(format!("unknown booking status '{}'", other)))
            }
        })
    }
}

/// Commands accepted by an existing booking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingAction {
    AssignStaff { staff_id: Uuid },
    Confirm,
    Start,
    /// `force` completes before the interval has ended
    Complete { force: bool },
    Cancel { reason: Option<String> },
    MarkNoShow,
    Reschedule { interval: TimeInterval },
}

impl BookingAction {
    fn name(&self) -> &'static str {
        match self {
            BookingAction::AssignStaff { .. } => "assign staff",
            BookingAction::Confirm => "confirm",
            BookingAction::Start => "start",
            BookingAction::Complete { .. } => "complete",
            BookingAction::Cancel { .. } => "cancel",
            BookingAction::MarkNoShow => "mark no-show",
            BookingAction::Reschedule { .. } => "reschedule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    StaffAssigned,
    Confirmed,
    Started,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

/// Emitted once per committed transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub booking_id: Uuid,
    pub provider_id: Uuid,
    pub staff_id: Uuid,
    pub customer_id: Uuid,
    pub occurred_at: DateTime<Utc>,
}

/// Audit record of one transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub event: EventKind,
    pub from: Option<BookingStatus>,
    pub to: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_interval: Option<TimeInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_staff_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub provider_id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub interval: TimeInterval,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub staff_id: Uuid,
    pub service_id: Uuid,
    pub customer_id: Uuid,
    pub interval: TimeInterval,
    pub status: BookingStatus,
    pub history: Vec<HistoryEntry>,
    /// Bumped on every transition; stores reject stale writes
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn create(new: NewBooking, now: DateTime<Utc>) -> (Booking, DomainEvent) {
        let booking = Booking {
            id: Uuid::new_v4(),
            provider_id: new.provider_id,
            staff_id: new.staff_id,
            service_id: new.service_id,
            customer_id: new.customer_id,
            interval: new.interval,
            status: BookingStatus::Created,
            history: vec![HistoryEntry {
                at: now,
                event: EventKind::Created,
                from: None,
                to: BookingStatus::Created,
                prior_interval: None,
                prior_staff_id: None,
                note: None,
            }],
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let event = booking.event(EventKind::Created, now);
        (booking, event)
    }

    fn event(&self, kind: EventKind, at: DateTime<Utc>) -> DomainEvent {
        DomainEvent {
            kind,
            booking_id: self.id,
            provider_id: self.provider_id,
            staff_id: self.staff_id,
            customer_id: self.customer_id,
            occurred_at: at,
        }
    }

    fn reject(&self, action: &BookingAction, why: &str) -> AppError {
        AppError::InvalidBookingTransition(format!(
            "cannot {} booking {} in status {}: {}",
            action.name(),
            self.id,
            self.status,
            why
        ))
    }

    /// Compute the state after `action`. On error `self` is unchanged.
    pub fn apply(&self, action: BookingAction, now: DateTime<Utc>) -> AppResult<(Booking, DomainEvent)> {
        use BookingStatus::*;

        if self.status.is_terminal() {
            return Err(self.reject(&action, "booking is closed"));
        }

        let mut next = self.clone();
        let mut entry = HistoryEntry {
            at: now,
            event: EventKind::Created,
            from: Some(self.status),
            to: self.status,
            prior_interval: None,
            prior_staff_id: None,
            note: None,
        };

        match &action {
            BookingAction::AssignStaff { staff_id } => {
                if self.status != Created {
                    return Err(self.reject(&action, "staff can only change before confirmation"));
                }
                if *staff_id == self.staff_id {
                    return Err(self.reject(&action, "staff member is already assigned"));
                }
                entry.event = EventKind::StaffAssigned;
                entry.prior_staff_id = Some(self.staff_id);
                next.staff_id = *staff_id;
            }
            BookingAction::Confirm => {
                if self.status != Created {
                    return Err(self.reject(&action, "only new bookings can be confirmed"));
                }
                entry.event = EventKind::Confirmed;
                next.status = Confirmed;
            }
            BookingAction::Start => {
                if self.status != Confirmed {
                    return Err(self.reject(&action, "only confirmed bookings can start"));
                }
                if now < self.interval.start() {
                    return Err(self.reject(&action, "booking has not begun yet"));
                }
                entry.event = EventKind::Started;
                next.status = InProgress;
            }
            BookingAction::Complete { force } => {
                if !matches!(self.status, Confirmed | InProgress) {
                    return Err(self.reject(&action, "only confirmed bookings can complete"));
                }
                if !force && now < self.interval.end() {
                    return Err(self.reject(&action, "booking has not ended yet"));
                }
                entry.event = EventKind::Completed;
                next.status = Completed;
            }
            BookingAction::Cancel { reason } => {
                if !matches!(self.status, Created | Confirmed) {
                    return Err(self.reject(&action, "booking is already underway"));
                }
                entry.event = EventKind::Cancelled;
                entry.note = reason.clone();
                next.status = Cancelled;
            }
            BookingAction::MarkNoShow => {
                if self.status != Confirmed {
                    return Err(self.reject(&action, "only confirmed bookings can be no-shows"));
                }
                if now <= self.interval.start() {
                    return Err(self.reject(&action, "booking has not begun yet"));
                }
                entry.event = EventKind::NoShow;
                next.status = NoShow;
            }
            BookingAction::Reschedule { interval } => {
                if !matches!(self.status, Created | Confirmed) {
                    return Err(self.reject(&action, "booking is already underway"));
                }
                if interval.duration() != self.interval.duration() {
                    return Err(AppError::InvalidInterval(format!(
                        "rescheduled interval must last {} minutes, got {}",
                        self.interval.duration().num_minutes(),
                        interval.duration().num_minutes()
                    )));
                }
                if *interval == self.interval {
                    return Err(self.reject(&action, "booking is already at that time"));
                }
                entry.event = EventKind::Rescheduled;
                entry.prior_interval = Some(self.interval);
                next.interval = *interval;
                next.status = Created;
            }
        }

        entry.to = next.status;
        next.history.push(entry);
        next.version = self.version + 1;
        next.updated_at = now;

        let event = next.event(next.history[next.history.len() - 1].event, now);
        Ok((next, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, h, m, 0).unwrap()
    }

    fn booking() -> Booking {
        let interval = TimeInterval::new(at(11, 0), at(11, 30)).unwrap();
        Booking::create(
            NewBooking {
                provider_id: Uuid::new_v4(),
                staff_id: Uuid::new_v4(),
                service_id: Uuid::new_v4(),
                customer_id: Uuid::new_v4(),
                interval,
            },
            at(8, 0),
        )
        .0
    }

    fn confirmed() -> Booking {
        booking().apply(BookingAction::Confirm, at(8, 5)).unwrap().0
    }

    #[test]
    fn test_create_starts_history() {
        let b = booking();
        assert_eq!(b.status, BookingStatus::Created);
        assert_eq!(b.history.len(), 1);
        assert_eq!(b.version, 1);
    }

    #[test]
    fn test_confirm_then_complete() {
        let b = confirmed();
        assert_eq!(b.status, BookingStatus::Confirmed);

        let early = b.apply(BookingAction::Complete { force: false }, at(11, 10));
        assert!(matches!(early, Err(AppError::InvalidBookingTransition(_))));

        let (done, event) = b.apply(BookingAction::Complete { force: false }, at(11, 30)).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(event.kind, EventKind::Completed);
        assert_eq!(done.version, 3);
        assert_eq!(done.history.len(), 3);
    }

    #[test]
    fn test_forced_completion() {
        let (done, _) = confirmed()
            .apply(BookingAction::Complete { force: true }, at(9, 0))
            .unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
    }

    #[test]
    fn test_cancel_completed_is_rejected() {
        let (done, _) = confirmed()
            .apply(BookingAction::Complete { force: true }, at(12, 0))
            .unwrap();
        let result = done.apply(BookingAction::Cancel { reason: None }, at(12, 5));
        assert!(matches!(result, Err(AppError::InvalidBookingTransition(_))));
        assert_eq!(done.status, BookingStatus::Completed);
    }

    #[test]
    fn test_created_cannot_complete() {
        let result = booking().apply(BookingAction::Complete { force: true }, at(12, 0));
        assert!(matches!(result, Err(AppError::InvalidBookingTransition(_))));
    }

    #[test]
    fn test_no_show_needs_start_passed() {
        let b = confirmed();
        assert!(b.apply(BookingAction::MarkNoShow, at(11, 0)).is_err());
        let (ns, event) = b.apply(BookingAction::MarkNoShow, at(11, 1)).unwrap();
        assert_eq!(ns.status, BookingStatus::NoShow);
        assert_eq!(event.kind, EventKind::NoShow);
        assert!(booking().apply(BookingAction::MarkNoShow, at(12, 0)).is_err());
    }

    #[test]
    fn test_start_and_complete_from_in_progress() {
        let b = confirmed();
        assert!(b.apply(BookingAction::Start, at(10, 59)).is_err());
        let (started, _) = b.apply(BookingAction::Start, at(11, 0)).unwrap();
        assert_eq!(started.status, BookingStatus::InProgress);
        assert!(started.apply(BookingAction::Cancel { reason: None }, at(11, 5)).is_err());
        let (done, _) = started.apply(BookingAction::Complete { force: false }, at(11, 30)).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
    }

    #[test]
    fn test_reschedule_records_prior_interval() {
        let b = confirmed();
        let new_interval = TimeInterval::new(at(14, 0), at(14, 30)).unwrap();
        let (moved, event) = b
            .apply(BookingAction::Reschedule { interval: new_interval }, at(9, 0))
            .unwrap();

        assert_eq!(moved.id, b.id);
        assert_eq!(moved.status, BookingStatus::Created);
        assert_eq!(moved.interval, new_interval);
        assert_eq!(event.kind, EventKind::Rescheduled);
        let last = moved.history.last().unwrap();
        assert_eq!(last.prior_interval, Some(b.interval));
        assert_eq!(last.from, Some(BookingStatus::Confirmed));
    }

    #[test]
    fn test_reschedule_must_keep_duration() {
        let wrong = TimeInterval::starting_at(at(14, 0), Duration::minutes(45)).unwrap();
        let result = booking().apply(BookingAction::Reschedule { interval: wrong }, at(9, 0));
        assert!(matches!(result, Err(AppError::InvalidInterval(_))));
    }

    #[test]
    fn test_assign_staff_only_while_created() {
        let b = booking();
        let new_staff = Uuid::new_v4();
        let (assigned, event) = b
            .apply(BookingAction::AssignStaff { staff_id: new_staff }, at(9, 0))
            .unwrap();
        assert_eq!(assigned.staff_id, new_staff);
        assert_eq!(assigned.status, BookingStatus::Created);
        assert_eq!(event.kind, EventKind::StaffAssigned);
        assert_eq!(event.staff_id, new_staff);
        assert_eq!(assigned.history.last().unwrap().prior_staff_id, Some(b.staff_id));

        let result = confirmed().apply(BookingAction::AssignStaff { staff_id: new_staff }, at(9, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            BookingStatus::Created,
            BookingStatus::InProgress,
            BookingStatus::NoShow,
        ] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("archived".parse::<BookingStatus>().is_err());
    }
}
