//! Provider availability endpoints: hours administration, effective hours
//! and slot search

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::availability::{
        AvailabilityResponse, CreateDayException, CreateHoliday, CreatedResponse, DayScheduleResponse,
        EffectiveHoursQuery, EffectiveHoursResponse, RegisterProvider, SlotQuery, SlotResponse,
        StaffScheduleQuery, UpdateBusinessHours,
    },
    AppState,
};

/// Register a provider
#[utoipa::path(
    post,
    path = "/providers",
    tag = "providers",
    request_body = RegisterProvider,
    responses(
        (status = 201, description = "Provider registered", body = AvailabilityResponse),
        (status = 400, description = "Unknown time zone"),
        (status = 409, description = "Provider already registered")
    )
)]
pub async fn register_provider(
    State(state): State<AppState>,
    Json(request): Json<RegisterProvider>,
) -> AppResult<(StatusCode, Json<AvailabilityResponse>)> {
    let availability = state.services.availability.register_provider(request).await?;
    Ok((StatusCode::CREATED, Json(AvailabilityResponse::from(&availability))))
}

/// Get the availability of a provider
#[utoipa::path(
    get,
    path = "/providers/{id}/availability",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID")
    ),
    responses(
        (status = 200, description = "Business hours, holidays and exceptions", body = AvailabilityResponse),
        (status = 404, description = "Provider not found")
    )
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<AvailabilityResponse>> {
    let availability = state.services.availability.get(id).await?;
    Ok(Json(AvailabilityResponse::from(&availability)))
}

/// Replace weekly business hours of the provider or of one staff member
#[utoipa::path(
    put,
    path = "/providers/{id}/business-hours",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID")
    ),
    request_body = UpdateBusinessHours,
    responses(
        (status = 200, description = "Hours updated", body = AvailabilityResponse),
        (status = 400, description = "Invalid or overlapping hours"),
        (status = 404, description = "Provider or staff not found")
    )
)]
pub async fn update_business_hours(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBusinessHours>,
) -> AppResult<Json<AvailabilityResponse>> {
    let availability = state
        .services
        .availability
        .update_business_hours(id, request)
        .await?;
    Ok(Json(AvailabilityResponse::from(&availability)))
}

/// Add a holiday
#[utoipa::path(
    post,
    path = "/providers/{id}/holidays",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID")
    ),
    request_body = CreateHoliday,
    responses(
        (status = 201, description = "Holiday added", body = CreatedResponse),
        (status = 400, description = "Invalid date"),
        (status = 404, description = "Provider not found")
    )
)]
pub async fn add_holiday(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateHoliday>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let holiday_id = state.services.availability.add_holiday(id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: holiday_id })))
}

/// Delete a holiday
#[utoipa::path(
    delete,
    path = "/providers/{id}/holidays/{holiday_id}",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID"),
        ("holiday_id" = Uuid, Path, description = "Holiday ID")
    ),
    responses(
        (status = 204, description = "Holiday deleted"),
        (status = 404, description = "Provider or holiday not found")
    )
)]
pub async fn delete_holiday(
    State(state): State<AppState>,
    Path((id, holiday_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state.services.availability.delete_holiday(id, holiday_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a day exception (replaces one for the same staff and date)
#[utoipa::path(
    post,
    path = "/providers/{id}/exceptions",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID")
    ),
    request_body = CreateDayException,
    responses(
        (status = 201, description = "Exception added", body = CreatedResponse),
        (status = 400, description = "Invalid date or hours"),
        (status = 404, description = "Provider or staff not found")
    )
)]
pub async fn add_exception(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateDayException>,
) -> AppResult<(StatusCode, Json<CreatedResponse>)> {
    let exception_id = state.services.availability.add_exception(id, request).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: exception_id })))
}

/// Delete a day exception
#[utoipa::path(
    delete,
    path = "/providers/{id}/exceptions/{exception_id}",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID"),
        ("exception_id" = Uuid, Path, description = "Exception ID")
    ),
    responses(
        (status = 204, description = "Exception deleted"),
        (status = 404, description = "Provider or exception not found")
    )
)]
pub async fn delete_exception(
    State(state): State<AppState>,
    Path((id, exception_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    state
        .services
        .availability
        .delete_exception(id, exception_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Effective opening hours on one date
#[utoipa::path(
    get,
    path = "/providers/{id}/effective-hours",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID"),
        EffectiveHoursQuery
    ),
    responses(
        (status = 200, description = "Open intervals and the rule that produced them", body = EffectiveHoursResponse),
        (status = 400, description = "Invalid date"),
        (status = 404, description = "Provider not found")
    )
)]
pub async fn effective_hours(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<EffectiveHoursQuery>,
) -> AppResult<Json<EffectiveHoursResponse>> {
    let hours = state.services.availability.effective_hours(id, query).await?;
    Ok(Json(hours))
}

/// Open time of a staff member per date, time off removed
#[utoipa::path(
    get,
    path = "/providers/{id}/staff/{staff_id}/schedule",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID"),
        ("staff_id" = Uuid, Path, description = "Staff ID"),
        StaffScheduleQuery
    ),
    responses(
        (status = 200, description = "Open intervals per date", body = Vec<DayScheduleResponse>),
        (status = 400, description = "Invalid or too wide date range"),
        (status = 404, description = "Provider or staff not found")
    )
)]
pub async fn staff_schedule(
    State(state): State<AppState>,
    Path((id, staff_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<StaffScheduleQuery>,
) -> AppResult<Json<Vec<DayScheduleResponse>>> {
    let days = state
        .services
        .availability
        .staff_schedule(id, staff_id, query)
        .await?;
    Ok(Json(days))
}

/// Search bookable slots
#[utoipa::path(
    get,
    path = "/providers/{id}/slots",
    tag = "providers",
    params(
        ("id" = Uuid, Path, description = "Provider ID"),
        SlotQuery
    ),
    responses(
        (status = 200, description = "Slots in start order", body = Vec<SlotResponse>),
        (status = 400, description = "Invalid or too wide date range"),
        (status = 404, description = "Provider, service or staff not found")
    )
)]
pub async fn available_slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<SlotQuery>,
) -> AppResult<Json<Vec<SlotResponse>>> {
    let slots = state.services.availability.available_slots(id, query).await?;
    Ok(Json(slots))
}
