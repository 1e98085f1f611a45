//! Conflict guard: the single gate through which bookings are written.
//!
//! Writes that claim time (create, reschedule, staff change) take a
//! per-staff lock across "check for overlaps" and "persist", so competing
//! claims on one staff member are totally ordered. Different staff members
//! never share a lock. The storage layer's exclusion constraint backs this
//! up across processes.
//!
//! Every write runs in its own task together with the publication of its
//! domain event. A caller that goes away stops waiting but stops neither
//! the write nor the event.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::Rng;
use uuid::Uuid;

use crate::{
    config::GuardConfig,
    error::{AppError, AppResult},
    repository::{BookingStore, StoreError},
    scheduling::{Booking, DomainEvent},
    services::notifier::Notifier,
};

/// Bounded exponential backoff with jitter for transient storage failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_backoff);
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        capped.mul_f64(jitter)
    }
}

/// How a booking reaches storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Insert,
    Update,
}

#[derive(Clone)]
pub struct ConflictGuard {
    bookings: Arc<dyn BookingStore>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl ConflictGuard {
    pub fn new(bookings: Arc<dyn BookingStore>, notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self {
            bookings,
            locks: Arc::new(Mutex::new(HashMap::new())),
            notifier,
            policy,
        }
    }

    fn staff_lock(&self, staff_id: Uuid) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| AppError::Internal("staff lock table poisoned".to_string()))?;
        Ok(locks.entry(staff_id).or_default().clone())
    }

    /// Persist `booking` if its interval is free for its staff member, then
    /// publish `event`.
    ///
    /// The booking itself is ignored in the overlap check, so a reschedule
    /// may move into time it already holds.
    pub async fn reserve(&self, booking: Booking, write: Write, event: DomainEvent) -> AppResult<Booking> {
        let guard = self.clone();
        let task = tokio::spawn(async move {
            let lock = guard.staff_lock(booking.staff_id)?;
            let _held = lock.lock_owned().await;

            let clash = guard
                .bookings
                .overlapping(booking.staff_id, booking.interval)
                .await?
                .into_iter()
                .find(|other| other.id != booking.id);
            if let Some(other) = clash {
                tracing::info!(
                    "Booking {} for staff {} rejected: overlaps booking {}",
                    booking.id,
                    booking.staff_id,
                    other.id
                );
                return Err(AppError::Conflict(format!(
                    "Staff {} is already booked between {} and {}",
                    booking.staff_id,
                    other.interval.start(),
                    other.interval.end()
                )));
            }

            guard.write_with_retry(&booking, write).await?;
            guard.notifier.notify(&event);
            Ok::<_, AppError>(booking)
        });
        task.await
            .map_err(|e| AppError::Internal(format!("booking write task failed: {}", e)))?
    }

    /// Persist a transition that does not claim new time, then publish `event`
    pub async fn commit(&self, booking: Booking, event: DomainEvent) -> AppResult<Booking> {
        let guard = self.clone();
        let task = tokio::spawn(async move {
            guard.write_with_retry(&booking, Write::Update).await?;
            guard.notifier.notify(&event);
            Ok::<_, AppError>(booking)
        });
        task.await
            .map_err(|e| AppError::Internal(format!("booking write task failed: {}", e)))?
    }

    async fn write_with_retry(&self, booking: &Booking, write: Write) -> AppResult<()> {
        let mut attempt = 1;
        loop {
            let result = match write {
                Write::Insert => self.bookings.insert(booking).await,
                Write::Update => self.bookings.update(booking).await,
            };
            let err = match result {
                Ok(()) => return Ok(()),
                Err(err @ StoreError::Transient(_)) => err,
                Err(err) => {
                    if attempt > 1 && self.already_written(booking).await {
                        return Ok(());
                    }
                    return Err(err.into());
                }
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    "Giving up on booking {} after {} attempts: {}",
                    booking.id,
                    attempt,
                    err
                );
                return Err(AppError::Conflict(format!(
                    "Booking {} could not be saved, try again",
                    booking.id
                )));
            }

            let delay = self.policy.backoff(attempt);
            tracing::debug!(
                "Transient failure writing booking {} (attempt {}), retrying in {:?}: {}",
                booking.id,
                attempt,
                delay,
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// A transient failure may hide a write that did land
    async fn already_written(&self, booking: &Booking) -> bool {
        matches!(
            self.bookings.get(booking.id).await,
            Ok(Some(stored)) if stored == *booking
        )
    }
}
