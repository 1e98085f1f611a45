//! Scheduling engine: calendar arithmetic, opening-hours resolution, slot
//! generation and the booking lifecycle. Nothing in here performs I/O.

pub mod booking;
pub mod calendar;
pub mod hours;
pub mod resolver;
pub mod slots;

pub use booking::{Booking, BookingAction, BookingStatus, DomainEvent, EventKind, NewBooking};
pub use calendar::{DateRange, LocalHours, TimeInterval};
pub use hours::{DayException, ExceptionKind, Holiday, HolidayRule, HoursSource, ProviderAvailability, WeeklyHours};
pub use resolver::StaffSchedule;
pub use slots::{merge_by_start, Slot, SlotPlan};
