//! Booking endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::JsonOrDefault;
use crate::{
    error::AppResult,
    models::booking::{AssignStaff, BookingResponse, CancelBooking, CompleteBooking, CreateBooking, RescheduleBooking},
    AppState,
};

/// Book a slot
#[utoipa::path(
    post,
    path = "/bookings",
    tag = "bookings",
    request_body = CreateBooking,
    responses(
        (status = 201, description = "Booking created", body = BookingResponse),
        (status = 400, description = "Interval malformed, in the past, outside open hours or of the wrong length"),
        (status = 404, description = "Provider, service or staff not found"),
        (status = 409, description = "Slot already taken")
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBooking>,
) -> AppResult<(StatusCode, Json<BookingResponse>)> {
    let booking = state.services.bookings.create(request).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// Get a booking with its history
#[utoipa::path(
    get,
    path = "/bookings/{id}",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking", body = BookingResponse),
        (status = 404, description = "Booking not found")
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.get(id).await?;
    Ok(Json(booking.into()))
}

/// Confirm a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/confirm",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking confirmed", body = BookingResponse),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking changed concurrently"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.confirm(id).await?;
    Ok(Json(booking.into()))
}

/// Mark a confirmed booking as started
#[utoipa::path(
    post,
    path = "/bookings/{id}/start",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking in progress", body = BookingResponse),
        (status = 404, description = "Booking not found"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn start_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.start(id).await?;
    Ok(Json(booking.into()))
}

/// Complete a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/complete",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = CompleteBooking,
    responses(
        (status = 200, description = "Booking completed", body = BookingResponse),
        (status = 400, description = "Malformed body"),
        (status = 404, description = "Booking not found"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<CompleteBooking>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.complete(id, request.force).await?;
    Ok(Json(booking.into()))
}

/// Cancel a booking
#[utoipa::path(
    post,
    path = "/bookings/{id}/cancel",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = CancelBooking,
    responses(
        (status = 200, description = "Booking cancelled", body = BookingResponse),
        (status = 400, description = "Malformed body or reason too long"),
        (status = 404, description = "Booking not found"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonOrDefault(request): JsonOrDefault<CancelBooking>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.cancel(id, request).await?;
    Ok(Json(booking.into()))
}

/// Mark a confirmed booking as a no-show
#[utoipa::path(
    post,
    path = "/bookings/{id}/no-show",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    responses(
        (status = 200, description = "Booking marked as no-show", body = BookingResponse),
        (status = 404, description = "Booking not found"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.mark_no_show(id).await?;
    Ok(Json(booking.into()))
}

/// Move a booking to another staff member
#[utoipa::path(
    post,
    path = "/bookings/{id}/assign-staff",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = AssignStaff,
    responses(
        (status = 200, description = "Staff assigned", body = BookingResponse),
        (status = 400, description = "New staff member is not available then"),
        (status = 404, description = "Booking or staff not found"),
        (status = 409, description = "New staff member is already booked"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn assign_staff(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignStaff>,
) -> AppResult<Json<BookingResponse>> {
    let booking = state.services.bookings.assign_staff(id, request.staff_id).await?;
    Ok(Json(booking.into()))
}

/// Move a booking to another interval of the same length
#[utoipa::path(
    post,
    path = "/bookings/{id}/reschedule",
    tag = "bookings",
    params(
        ("id" = Uuid, Path, description = "Booking ID")
    ),
    request_body = RescheduleBooking,
    responses(
        (status = 200, description = "Booking rescheduled", body = BookingResponse),
        (status = 400, description = "Interval malformed, in the past or outside open hours"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Interval already taken"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn reschedule_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RescheduleBooking>,
) -> AppResult<Json<BookingResponse>> {
    let interval = request.interval()?;
    let booking = state.services.bookings.reschedule(id, interval).await?;
    Ok(Json(booking.into()))
}
