//! HTTP API tests, driving the router in process

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{empty, seed_directory, setup, tehran, MONDAY};

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health_check() {
    let harness = empty();
    let (status, body) = send(&harness.router, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&harness.router, Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_provider_and_hours() {
    let harness = empty();
    seed_directory(&harness, 30);
    let provider_id = harness.provider_id;

    let (status, body) = send(
        &harness.router,
        Method::POST,
        "/api/v1/providers",
        Some(json!({ "provider_id": provider_id, "time_zone": "Asia/Tehran" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["version"], 1);

    let (status, _) = send(
        &harness.router,
        Method::POST,
        "/api/v1/providers",
        Some(json!({ "provider_id": provider_id, "time_zone": "Asia/Tehran" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &harness.router,
        Method::POST,
        "/api/v1/providers",
        Some(json!({ "provider_id": Uuid::new_v4(), "time_zone": "Mars/Olympus_Mons" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &harness.router,
        Method::PUT,
        &format!("/api/v1/providers/{}/business-hours", provider_id),
        Some(json!({
            "hours": [
                { "day_of_week": 0, "open_time": "09:00", "close_time": "13:00" },
                { "day_of_week": 0, "open_time": "14:00", "close_time": "18:00" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["business_hours"].as_array().unwrap().len(), 2);

    let (status, body) = send(
        &harness.router,
        Method::GET,
        &format!("/api/v1/providers/{}/effective-hours?date={}", provider_id, MONDAY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "provider_hours");
    assert_eq!(body["intervals"].as_array().unwrap().len(), 2);
    assert_eq!(body["intervals"][0]["start"], "2026-10-19T09:00:00+03:30");
}

#[tokio::test]
async fn test_overlapping_hours_rejected() {
    let harness = setup().await;
    let (status, body) = send(
        &harness.router,
        Method::PUT,
        &format!("/api/v1/providers/{}/business-hours", harness.provider_id),
        Some(json!({
            "hours": [
                { "day_of_week": 2, "open_time": "09:00", "close_time": "13:00" },
                { "day_of_week": 2, "open_time": "12:00", "close_time": "18:00" }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_holiday_closes_the_day() {
    let harness = setup().await;
    let base = format!("/api/v1/providers/{}", harness.provider_id);

    let (status, body) = send(
        &harness.router,
        Method::POST,
        &format!("{}/holidays", base),
        Some(json!({ "label": "Founders day", "date": MONDAY, "recurring": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let holiday_id = body["id"].as_str().unwrap().to_string();

    let slots_uri = format!(
        "{}/slots?service_id={}&start_date={}&end_date={}",
        base, harness.service_id, MONDAY, MONDAY
    );
    let (_, body) = send(&harness.router, Method::GET, &slots_uri, None).await;
    assert!(body.as_array().unwrap().is_empty());

    let (status, _) = send(
        &harness.router,
        Method::DELETE,
        &format!("{}/holidays/{}", base, holiday_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = send(&harness.router, Method::GET, &slots_uri, None).await;
    assert_eq!(body.as_array().unwrap().len(), 32);
}

#[tokio::test]
async fn test_slot_search_validates_range() {
    let harness = setup().await;
    let base = format!("/api/v1/providers/{}/slots", harness.provider_id);

    let (status, _) = send(
        &harness.router,
        Method::GET,
        &format!(
            "{}?service_id={}&start_date=2026-10-19&end_date=2027-10-19",
            base, harness.service_id
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &harness.router,
        Method::GET,
        &format!(
            "{}?service_id={}&start_date=2026-10-19&end_date=2026-10-19",
            base,
            Uuid::new_v4()
        ),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_booking_flow() {
    let harness = setup().await;
    let staff_id = harness.staff[0];
    let request = json!({
        "provider_id": harness.provider_id,
        "staff_id": staff_id,
        "service_id": harness.service_id,
        "customer_id": Uuid::new_v4(),
        "start": tehran(11, 0),
        "end": tehran(11, 30),
    });

    let (status, booking) = send(&harness.router, Method::POST, "/api/v1/bookings", Some(request.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "created");
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, body) = send(&harness.router, Method::POST, "/api/v1/bookings", Some(request)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");

    let (status, body) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/confirm", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/complete", id),
        Some(json!({ "force": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    let (status, _) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/cancel", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&harness.router, Method::GET, &format!("/api/v1/bookings/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["history"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_reschedule_over_the_api() {
    let harness = setup().await;
    let booking = harness
        .services
        .bookings
        .create(harness.booking(harness.staff[1], tehran(9, 0)))
        .await
        .unwrap();

    let (status, _) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/reschedule", booking.id),
        Some(json!({ "start": tehran(17, 0), "end": tehran(17, 30) })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/reschedule", booking.id),
        Some(json!({ "start": tehran(16, 30), "end": tehran(17, 0) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["version"], 2);
    assert_eq!(body["start"], "2026-10-19T13:00:00Z");
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() {
    let harness = setup().await;
    let (status, body) = send(
        &harness.router,
        Method::GET,
        &format!("/api/v1/bookings/{}", Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);
}

#[tokio::test]
async fn test_malformed_body_is_rejected_not_ignored() {
    let harness = setup().await;
    let booking = harness
        .services
        .bookings
        .create(harness.booking(harness.staff[0], tehran(10, 0)))
        .await
        .unwrap();
    let cancel = format!("/api/v1/bookings/{}/cancel", booking.id);

    let (status, body) = send(&harness.router, Method::POST, &cancel, Some(json!({ "reason": 5 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (_, body) = send(&harness.router, Method::GET, &format!("/api/v1/bookings/{}", booking.id), None).await;
    assert_eq!(body["status"], "created");
    assert_eq!(body["version"], 1);

    let (status, body) = send(&harness.router, Method::POST, &cancel, Some(json!({ "reason": "rain" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["history"][1]["note"], "rain");
}

#[tokio::test]
async fn test_lifecycle_bodies_are_optional() {
    let harness = setup().await;
    let booking = harness
        .services
        .bookings
        .create(harness.booking(harness.staff[1], tehran(10, 0)))
        .await
        .unwrap();

    let (status, body) = send(
        &harness.router,
        Method::POST,
        &format!("/api/v1/bookings/{}/cancel", booking.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
}
