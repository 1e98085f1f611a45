//! Data models for Bookwell

pub mod availability;
pub mod booking;
pub mod service;

// Re-export commonly used types
pub use availability::{AvailabilityResponse, SlotQuery, SlotResponse};
pub use booking::{BookingResponse, CreateBooking};
pub use service::ServiceSpec;
