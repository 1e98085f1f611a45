//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{bookings, health, providers};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bookwell API",
        version = "0.3.0",
        description = "Service booking availability and scheduling REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Bookwell Team", email = "dev@bookwell.io")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Providers
        providers::register_provider,
        providers::get_availability,
        providers::update_business_hours,
        providers::add_holiday,
        providers::delete_holiday,
        providers::add_exception,
        providers::delete_exception,
        providers::effective_hours,
        providers::staff_schedule,
        providers::available_slots,
        // Bookings
        bookings::create_booking,
        bookings::get_booking,
        bookings::confirm_booking,
        bookings::start_booking,
        bookings::complete_booking,
        bookings::cancel_booking,
        bookings::mark_no_show,
        bookings::assign_staff,
        bookings::reschedule_booking,
    ),
    components(
        schemas(
            // Providers
            crate::models::availability::RegisterProvider,
            crate::models::availability::HoursRange,
            crate::models::availability::BusinessHoursEntry,
            crate::models::availability::UpdateBusinessHours,
            crate::models::availability::CreateHoliday,
            crate::models::availability::HolidayResponse,
            crate::models::availability::CreateDayException,
            crate::models::availability::DayExceptionResponse,
            crate::models::availability::StaffHoursResponse,
            crate::models::availability::AvailabilityResponse,
            crate::models::availability::CreatedResponse,
            crate::models::availability::LocalInterval,
            crate::models::availability::EffectiveHoursResponse,
            crate::models::availability::DayScheduleResponse,
            crate::models::availability::SlotResponse,
            crate::scheduling::HolidayRule,
            crate::scheduling::HoursSource,
            // Bookings
            crate::models::booking::CreateBooking,
            crate::models::booking::AssignStaff,
            crate::models::booking::RescheduleBooking,
            crate::models::booking::CancelBooking,
            crate::models::booking::CompleteBooking,
            crate::models::booking::BookingResponse,
            crate::scheduling::BookingStatus,
            crate::scheduling::EventKind,
            crate::scheduling::TimeInterval,
            crate::scheduling::booking::HistoryEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "providers", description = "Business hours, holidays, exceptions and slot search"),
        (name = "bookings", description = "Booking lifecycle")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
