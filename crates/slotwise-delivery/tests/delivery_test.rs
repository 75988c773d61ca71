//! End-to-end delivery pipeline tests against a mocked endpoint.
//!
//! Each test wires a booking into the dispatcher and drains the engine
//! batch-by-batch, asserting on the ledger and the appointment delivery
//! flags.

use std::time::Duration;

use slotwise_core::{
    storage::{DeliveryLedger, SlotLedger},
    DeliveryStatus, EventType,
};
use slotwise_delivery::{DeliveryConfig, EndpointConfig, RetryPolicy};
use slotwise_testing::TestEnv;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn endpoint_for(url: Option<String>) -> EndpointConfig {
    EndpointConfig {
        url,
        secret: "test-secret".to_string(),
        signature_header: "X-Webhook-Signature".to_string(),
    }
}

fn config_without_jitter() -> DeliveryConfig {
    DeliveryConfig {
        retry_policy: RetryPolicy { jitter: false, ..Default::default() },
        ..Default::default()
    }
}

async fn book_appointment(env: &TestEnv) -> slotwise_core::Appointment {
    let fixture = env.seed_salon().await;
    let booking = env.booking_service_quiet();
    booking
        .book(slotwise_booking::BookingRequest {
            customer_id: fixture.customer.id,
            stylist_id: fixture.stylist.id,
            service_id: fixture.service.id,
            date: env.future_date(),
            time: chrono::NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            notes: None,
        })
        .await
        .expect("booking succeeds")
}

#[tokio::test]
async fn delivering_created_yields_one_sent_record_and_sets_the_flag() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/webhook"))
        .and(matchers::header(
            "idempotency-key",
            format!("appointment:{}:created", appointment.id.0).as_str(),
        ))
        .and(matchers::header_exists("X-Webhook-Signature"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(format!("{}/webhook", server.uri())));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    let processed = engine.process_batch().await.unwrap();
    assert_eq!(processed, 1);

    let records = env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap();
    assert_eq!(records.len(), 1, "exactly one delivery record exists");
    assert_eq!(records[0].status, DeliveryStatus::Sent);
    assert_eq!(records[0].attempts, 1);
    assert_eq!(records[0].response_code, Some(200));

    let updated = env.slot_ledger.find(appointment.id).await.unwrap().unwrap();
    assert!(updated.event_created_sent);
    assert!(!updated.event_confirmed_sent);

    server.verify().await;
}

#[tokio::test]
async fn duplicate_scheduling_reuses_the_same_record() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let endpoint = endpoint_for(Some("https://hooks.example.com/x".to_string()));
    let dispatcher = env.dispatcher(endpoint);

    let first = dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    let second = dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(env.delivery_ledger.all_records().await.len(), 1);
}

#[tokio::test]
async fn persistent_server_errors_exhaust_retries_then_fail() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(server.uri()));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();

    let max_attempts = RetryPolicy::default().max_attempts;
    for _ in 0..max_attempts {
        let processed = engine.process_batch().await.unwrap();
        assert_eq!(processed, 1);
        // Skip past whatever backoff was scheduled.
        env.clock.advance(Duration::from_secs(2 * 3600));
    }

    let record = env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()
        [0]
    .clone();
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert_eq!(record.attempts, max_attempts);
    assert_eq!(record.response_code, Some(500));
    assert!(record.error_message.as_deref().unwrap_or_default().contains("5 attempts"));

    // Terminal: nothing left to claim.
    assert_eq!(engine.process_batch().await.unwrap(), 0);

    let updated = env.slot_ledger.find(appointment.id).await.unwrap().unwrap();
    assert!(!updated.event_created_sent);
}

#[tokio::test]
async fn transient_failure_schedules_backoff_before_the_next_attempt() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(server.uri()));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    let record =
        env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()[0].clone();
    assert_eq!(record.status, DeliveryStatus::Queued);
    assert_eq!(record.attempts, 1);
    let due = record.next_attempt_at.expect("retry must be scheduled");
    assert_eq!(due, record.last_attempt_at.unwrap() + chrono::Duration::seconds(60));

    // Not due yet: the worker leaves it alone.
    assert_eq!(engine.process_batch().await.unwrap(), 0);

    env.clock.advance(Duration::from_secs(61));
    assert_eq!(engine.process_batch().await.unwrap(), 1);
}

#[tokio::test]
async fn client_errors_fail_immediately_without_retry() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(server.uri()));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    let record =
        env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()[0].clone();
    assert_eq!(record.status, DeliveryStatus::Failed);
    assert_eq!(record.attempts, 1);
    assert_eq!(record.response_code, Some(422));
    assert!(record.next_attempt_at.is_none());

    // Never retried, even after any amount of time.
    env.clock.advance(Duration::from_secs(24 * 3600));
    assert_eq!(engine.process_batch().await.unwrap(), 0);

    server.verify().await;
}

#[tokio::test]
async fn no_endpoint_parks_the_record_without_any_http_call() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let endpoint = endpoint_for(None);
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    // Scheduling twice still yields one parked record.
    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();

    assert_eq!(engine.process_batch().await.unwrap(), 0);

    let records = env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeliveryStatus::PendingNoEndpoint);
    assert_eq!(records[0].attempts, 0);
    assert!(records[0]
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("no webhook endpoint configured"));

    server.verify().await;
}

#[tokio::test]
async fn created_and_confirmed_events_produce_distinct_records() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(server.uri()));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    dispatcher.deliver(appointment.id, EventType::Confirmed).await.unwrap();
    engine.process_batch().await.unwrap();

    let records = env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.status == DeliveryStatus::Sent));

    let updated = env.slot_ledger.find(appointment.id).await.unwrap().unwrap();
    assert!(updated.event_created_sent);
    assert!(updated.event_confirmed_sent);

    server.verify().await;
}

#[tokio::test]
async fn payload_snapshot_is_what_gets_posted() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::body_partial_json(serde_json::json!({
            "appointment_id": appointment.id.to_string(),
            "event_type": "created",
            "status": "pending",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = endpoint_for(Some(server.uri()));
    let dispatcher = env.dispatcher(endpoint.clone());
    let engine = env.engine(endpoint, config_without_jitter());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    server.verify().await;
}
