//! In-memory storage backend, used by tests and local runs

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use super::{AvailabilityStore, BookingStore, ServiceCatalog, StaffDirectory, StoreError, StoreResult};
use crate::{
    models::ServiceSpec,
    scheduling::{Booking, ProviderAvailability, TimeInterval},
};

#[derive(Default)]
struct State {
    providers: HashMap<Uuid, ProviderAvailability>,
    bookings: HashMap<Uuid, Booking>,
    services: HashMap<Uuid, ServiceSpec>,
    staff: HashMap<Uuid, Vec<Uuid>>,
    time_off: HashMap<Uuid, Vec<TimeInterval>>,
    /// Booking writes left to fail with a transient error
    failing_writes: u32,
}

/// Shared in-process store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    // ---- Seeding (catalog and directory data owned elsewhere) ----

    pub fn add_service(&self, service: ServiceSpec) -> StoreResult<()> {
        self.write()?.services.insert(service.id, service);
        Ok(())
    }

    pub fn add_staff(&self, provider_id: Uuid, staff_id: Uuid) -> StoreResult<()> {
        let mut state = self.write()?;
        let members = state.staff.entry(provider_id).or_default();
        if !members.contains(&staff_id) {
            members.push(staff_id);
        }
        Ok(())
    }

    pub fn add_time_off(&self, staff_id: Uuid, interval: TimeInterval) -> StoreResult<()> {
        self.write()?.time_off.entry(staff_id).or_default().push(interval);
        Ok(())
    }

    /// Make the next `count` booking writes fail as transient errors
    pub fn fail_next_writes(&self, count: u32) -> StoreResult<()> {
        self.write()?.failing_writes = count;
        Ok(())
    }
}

fn take_failure(state: &mut State) -> StoreResult<()> {
    if state.failing_writes > 0 {
        state.failing_writes -= 1;
        return Err(StoreError::Transient("injected write failure".to_string()));
    }
    Ok(())
}

/// Same rule as the exclusion constraint on the bookings table
fn check_exclusion(state: &State, booking: &Booking) -> StoreResult<()> {
    if !booking.status.holds_time() {
        return Ok(());
    }
    let clash = state.bookings.values().any(|other| {
        other.id != booking.id
            && other.staff_id == booking.staff_id
            && other.status.holds_time()
            && other.interval.overlaps(&booking.interval)
    });
    if clash {
        return Err(StoreError::Conflict(format!(
            "staff {} already has a booking overlapping {} - {}",
            booking.staff_id,
            booking.interval.start(),
            booking.interval.end()
        )));
    }
    Ok(())
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn create(&self, availability: &ProviderAvailability) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.providers.contains_key(&availability.provider_id) {
            return Err(StoreError::Conflict(format!(
                "provider {} is already registered",
                availability.provider_id
            )));
        }
        let mut stored = availability.clone();
        stored.version = 1;
        state.providers.insert(stored.provider_id, stored);
        Ok(())
    }

    async fn load(&self, provider_id: Uuid) -> StoreResult<Option<ProviderAvailability>> {
        Ok(self.read()?.providers.get(&provider_id).cloned())
    }

    async fn save(&self, availability: &ProviderAvailability) -> StoreResult<i64> {
        let mut state = self.write()?;
        let stored = state
            .providers
            .get_mut(&availability.provider_id)
            .ok_or(StoreError::VersionMismatch)?;
        if stored.version != availability.version {
            return Err(StoreError::VersionMismatch);
        }
        let version = availability.version + 1;
        *stored = availability.clone();
        stored.version = version;
        Ok(version)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        Ok(self.read()?.bookings.get(&id).cloned())
    }

    async fn overlapping(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<Booking>> {
        let state = self.read()?;
        let mut found: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.staff_id == staff_id && b.status.holds_time() && b.interval.overlaps(&window))
            .cloned()
            .collect();
        found.sort_by_key(|b| b.interval.start());
        Ok(found)
    }

    async fn insert(&self, booking: &Booking) -> StoreResult<()> {
        let mut state = self.write()?;
        take_failure(&mut state)?;
        if state.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict(format!("booking {} already exists", booking.id)));
        }
        check_exclusion(&state, booking)?;
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update(&self, booking: &Booking) -> StoreResult<()> {
        let mut state = self.write()?;
        take_failure(&mut state)?;
        match state.bookings.get(&booking.id) {
            Some(stored) if stored.version + 1 == booking.version => {}
            _ => return Err(StoreError::VersionMismatch),
        }
        check_exclusion(&state, booking)?;
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for MemoryStore {
    async fn get_service(&self, service_id: Uuid) -> StoreResult<Option<ServiceSpec>> {
        Ok(self.read()?.services.get(&service_id).cloned())
    }
}

#[async_trait]
impl StaffDirectory for MemoryStore {
    async fn list_staff(&self, provider_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self.read()?.staff.get(&provider_id).cloned().unwrap_or_default())
    }

    async fn get_staff_time_off(&self, staff_id: Uuid, window: TimeInterval) -> StoreResult<Vec<TimeInterval>> {
        Ok(self
            .read()?
            .time_off
            .get(&staff_id)
            .map(|all| all.iter().filter(|t| t.overlaps(&window)).copied().collect())
            .unwrap_or_default())
    }
}
