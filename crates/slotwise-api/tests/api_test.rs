//! HTTP surface tests driven through the router with in-memory services.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use slotwise_api::{create_router, AppState};
use slotwise_core::NoOpEventHandler;
use slotwise_testing::{SalonFixture, TestEnv};
use tower::ServiceExt;

struct Harness {
    app: Router,
    fixture: SalonFixture,
    env: TestEnv,
}

async fn harness() -> Harness {
    let env = TestEnv::new();
    let fixture = env.seed_salon().await;
    fixture.seed_full_week_hours(&env.directory).await;

    let events = Arc::new(NoOpEventHandler::new());
    let state = AppState::new(
        Arc::new(env.booking_service(events.clone())),
        Arc::new(env.availability()),
        Arc::new(env.lifecycle(events)),
    );

    Harness { app: create_router(state), fixture, env }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn book_request(harness: &Harness, time_slot: &str) -> Request<Body> {
    let body = json!({
        "stylist_id": harness.fixture.stylist.id.0,
        "service_id": harness.fixture.service.id.0,
        "date": harness.env.future_date().to_string(),
        "time_slot": time_slot,
        "notes": "first visit",
    });

    Request::builder()
        .method("POST")
        .uri("/book")
        .header("content-type", "application/json")
        .header("x-customer-id", harness.fixture.customer.id.to_string())
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn booking_returns_201_with_the_appointment() {
    let harness = harness().await;

    let response = harness.app.clone().oneshot(book_request(&harness, "14:00")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["appointment"]["status"], "pending");
    assert_eq!(body["appointment"]["time"], "14:00");
    assert!(body["appointment"]["persian_date"].as_str().unwrap().contains('/'));
}

#[tokio::test]
async fn double_booking_returns_409_slot_taken() {
    let harness = harness().await;

    let first = harness.app.clone().oneshot(book_request(&harness, "15:00")).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = harness.app.clone().oneshot(book_request(&harness, "15:00")).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "slot_taken");
}

#[tokio::test]
async fn booking_without_identity_is_forbidden() {
    let harness = harness().await;

    let mut request = book_request(&harness, "16:00");
    request.headers_mut().remove("x-customer-id");

    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_time_slot_is_a_validation_error() {
    let harness = harness().await;

    let body = json!({
        "stylist_id": harness.fixture.stylist.id.0,
        "service_id": harness.fixture.service.id.0,
        "date": harness.env.future_date().to_string(),
        "time_slot": "mid-afternoon",
    });
    let request = Request::builder()
        .method("POST")
        .uri("/book")
        .header("content-type", "application/json")
        .header("x-customer-id", harness.fixture.customer.id.to_string())
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_lists_open_slots_and_hours() {
    let harness = harness().await;

    harness.app.clone().oneshot(book_request(&harness, "09:00")).await.unwrap();

    let uri = format!(
        "/availability?stylist_id={}&date={}",
        harness.fixture.stylist.id.0,
        harness.env.future_date()
    );
    let response = harness
        .app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let slots: Vec<&str> = body["slots"].as_array().unwrap().iter().map(|s| s.as_str().unwrap()).collect();
    assert!(!slots.contains(&"09:00"), "booked slot is not offered");
    assert!(slots.contains(&"09:30"));
    assert_eq!(body["working_hours"]["start"], "09:00");
    assert_eq!(body["working_hours"]["end"], "17:00");
}

#[tokio::test]
async fn manager_cancel_without_reason_is_rejected() {
    let harness = harness().await;

    let created = harness.app.clone().oneshot(book_request(&harness, "10:00")).await.unwrap();
    let appointment_id = body_json(created).await["appointment"]["id"].as_str().unwrap().to_string();

    let manager_id = uuid::Uuid::new_v4().to_string();
    let cancel = |body: Value| {
        Request::builder()
            .method("POST")
            .uri(format!("/appointments/{appointment_id}/cancel"))
            .header("content-type", "application/json")
            .header("x-actor-id", &manager_id)
            .header("x-actor-role", "manager")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    };

    let response = harness.app.clone().oneshot(cancel(json!({}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "reason required");

    let response =
        harness.app.clone().oneshot(cancel(json!({"reason": "stylist sick"}))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "cancelled");
}

#[tokio::test]
async fn customers_cannot_confirm_appointments() {
    let harness = harness().await;

    let created = harness.app.clone().oneshot(book_request(&harness, "11:00")).await.unwrap();
    let appointment_id = body_json(created).await["appointment"]["id"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/appointments/{appointment_id}/confirm"))
        .header("x-actor-id", harness.fixture.customer.id.to_string())
        .header("x-actor-role", "customer")
        .body(Body::empty())
        .unwrap();

    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_endpoint_responds_ok() {
    let harness = harness().await;

    let response = harness
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}
