//! API handlers for Bookwell REST endpoints

pub mod bookings;
pub mod health;
pub mod openapi;
pub mod providers;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    routing::{delete, get, post, put},
    Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, AppState};

/// JSON body that may be left out. An empty body gives `T::default()`;
/// any other body must be valid JSON for `T`.
pub struct JsonOrDefault<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(format!("Unreadable request body: {}", e)))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }
        serde_json::from_slice(&bytes)
            .map(Self)
            .map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Providers and their availability
        .route("/providers", post(providers::register_provider))
        .route("/providers/:id/availability", get(providers::get_availability))
        .route("/providers/:id/business-hours", put(providers::update_business_hours))
        .route("/providers/:id/holidays", post(providers::add_holiday))
        .route("/providers/:id/holidays/:holiday_id", delete(providers::delete_holiday))
        .route("/providers/:id/exceptions", post(providers::add_exception))
        .route("/providers/:id/exceptions/:exception_id", delete(providers::delete_exception))
        .route("/providers/:id/effective-hours", get(providers::effective_hours))
        .route("/providers/:id/staff/:staff_id/schedule", get(providers::staff_schedule))
        .route("/providers/:id/slots", get(providers::available_slots))
        // Bookings
        .route("/bookings", post(bookings::create_booking))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/confirm", post(bookings::confirm_booking))
        .route("/bookings/:id/start", post(bookings::start_booking))
        .route("/bookings/:id/complete", post(bookings::complete_booking))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/no-show", post(bookings::mark_no_show))
        .route("/bookings/:id/assign-staff", post(bookings::assign_staff))
        .route("/bookings/:id/reschedule", post(bookings::reschedule_booking))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
