//! Shared fixture: a Tehran provider open Monday to Friday 09:00-17:00,
//! two staff members and a 30 minute service, on the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use bookwell_server::{
    api,
    config::{AppConfig, StorageBackend},
    models::{
        availability::{BusinessHoursEntry, HoursRange, RegisterProvider, SlotQuery, UpdateBusinessHours},
        CreateBooking, ServiceSpec,
    },
    repository::{memory::MemoryStore, Repository},
    scheduling::DomainEvent,
    services::{clock::FixedClock, notifier::ChannelNotifier, payments::ManualGateway, Services},
    AppState,
};

pub const MONDAY: &str = "2026-10-19";

/// Monday 2026-10-19 at `hour:minute` in Tehran (UTC+03:30)
pub fn tehran(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap() + Duration::minutes((hour * 60 + minute) as i64 - 210)
}

pub struct Harness {
    pub services: Arc<Services>,
    pub router: axum::Router,
    pub store: MemoryStore,
    pub clock: FixedClock,
    pub events: UnboundedReceiver<DomainEvent>,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub staff: Vec<Uuid>,
}

impl Harness {
    pub fn slot_query(&self, staff_id: Option<Uuid>) -> SlotQuery {
        SlotQuery {
            service_id: self.service_id,
            staff_id,
            start_date: MONDAY.to_string(),
            end_date: MONDAY.to_string(),
            limit: None,
        }
    }

    pub fn booking(&self, staff_id: Uuid, start: DateTime<Utc>) -> CreateBooking {
        CreateBooking {
            provider_id: self.provider_id,
            staff_id,
            service_id: self.service_id,
            customer_id: Uuid::new_v4(),
            start,
            end: start + Duration::minutes(30),
        }
    }

    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Services over an empty store, clock set to the Sunday before
pub fn empty() -> Harness {
    let store = MemoryStore::new();
    let clock = FixedClock::new(tehran(9, 0) - Duration::days(1));
    let (notifier, events) = ChannelNotifier::new();

    let mut config = AppConfig::default();
    config.database.backend = StorageBackend::Memory;
    config.guard.base_backoff_ms = 1;
    config.guard.max_backoff_ms = 2;

    let services = Arc::new(Services::with_parts(
        Repository::in_memory(store.clone()),
        &config,
        Arc::new(clock.clone()),
        Arc::new(notifier),
        Arc::new(ManualGateway::new()),
    ));
    let router = api::create_router(AppState {
        config: Arc::new(config),
        services: services.clone(),
    });

    Harness {
        services,
        router,
        store,
        clock,
        events,
        provider_id: Uuid::new_v4(),
        service_id: Uuid::new_v4(),
        staff: vec![Uuid::new_v4(), Uuid::new_v4()],
    }
}

/// Seed the directory and catalog of `harness` without registering the provider
pub fn seed_directory(harness: &Harness, duration_minutes: i32) {
    harness
        .store
        .add_service(ServiceSpec {
            id: harness.service_id,
            provider_id: harness.provider_id,
            name: "Consultation".to_string(),
            duration_minutes,
            buffer_before_minutes: 0,
            buffer_after_minutes: 0,
        })
        .unwrap();
    for staff_id in &harness.staff {
        harness.store.add_staff(harness.provider_id, *staff_id).unwrap();
    }
}

/// Registered provider with weekday hours, ready for bookings
pub async fn setup() -> Harness {
    let harness = empty();
    seed_directory(&harness, 30);

    let availability = &harness.services.availability;
    availability
        .register_provider(RegisterProvider {
            provider_id: harness.provider_id,
            time_zone: "Asia/Tehran".to_string(),
        })
        .await
        .unwrap();
    availability
        .update_business_hours(
            harness.provider_id,
            UpdateBusinessHours {
                staff_id: None,
                hours: (0..5)
                    .map(|day_of_week| BusinessHoursEntry {
                        day_of_week,
                        hours: HoursRange {
                            open_time: "09:00".to_string(),
                            close_time: "17:00".to_string(),
                        },
                    })
                    .collect(),
            },
        )
        .await
        .unwrap();
    harness
}
