//! Business logic services

pub mod availability;
pub mod bookings;
pub mod clock;
pub mod guard;
pub mod notifier;
pub mod payments;

use std::sync::Arc;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

use clock::{Clock, SystemClock};
use guard::{ConflictGuard, RetryPolicy};
use notifier::Notifier;
use payments::PaymentGateway;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub availability: availability::AvailabilityService,
    pub bookings: bookings::BookingService,
    pub payments: Arc<dyn PaymentGateway>,
}

impl Services {
    /// Create all services with the given repository, using the system
    /// clock and the configured notifier and payment gateway
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let notifier = notifier::notifier_from_config(&config.notifications)?;
        let payments = payments::gateway_from_config(&config.payments)?;
        Ok(Self::with_parts(
            repository,
            config,
            Arc::new(SystemClock),
            notifier,
            payments,
        ))
    }

    /// Create all services around explicit collaborators
    pub fn with_parts(
        repository: Repository,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        payments: Arc<dyn PaymentGateway>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.guard);
        let guard = ConflictGuard::new(repository.bookings.clone(), notifier, retry);
        Self {
            availability: availability::AvailabilityService::new(
                repository.clone(),
                clock.clone(),
                config.scheduling.clone(),
                retry,
            ),
            bookings: bookings::BookingService::new(repository, guard, clock),
            payments,
        }
    }
}
