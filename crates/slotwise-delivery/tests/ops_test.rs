//! Operator retry and resend command tests.

use slotwise_core::{storage::DeliveryLedger, CoreError, DeliveryStatus, EventType};
use slotwise_delivery::{DeliveryConfig, EndpointConfig, RetryPolicy};
use slotwise_testing::TestEnv;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn endpoint(url: Option<String>) -> EndpointConfig {
    EndpointConfig {
        url,
        secret: "test-secret".to_string(),
        signature_header: "X-Webhook-Signature".to_string(),
    }
}

fn one_shot_config() -> DeliveryConfig {
    DeliveryConfig {
        retry_policy: RetryPolicy { max_attempts: 1, jitter: false, ..Default::default() },
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
            time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            notes: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn resend_is_rejected_while_the_canonical_record_is_not_terminal() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let dispatcher = env.dispatcher(endpoint(Some("https://hooks.example.com/x".into())));
    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();

    let err = dispatcher.resend(appointment.id, EventType::Created).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)), "queued record blocks resend: {err}");
}

#[tokio::test]
async fn resend_after_terminal_failure_creates_a_fresh_record() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let ep = endpoint(Some(server.uri()));
    let dispatcher = env.dispatcher(ep.clone());
    let engine = env.engine(ep, one_shot_config());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    let canonical =
        env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()[0].clone();
    assert_eq!(canonical.status, DeliveryStatus::Failed);

    let resent = dispatcher.resend(appointment.id, EventType::Created).await.unwrap();
    assert_ne!(resent.id, canonical.id);
    assert_eq!(resent.status, DeliveryStatus::Queued);
    assert_eq!(resent.idempotency_key, format!("appointment:{}:created:r1", appointment.id.0));
    assert_eq!(resent.attempts, 0);

    // The canonical record keeps its audit trail untouched.
    let records = env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap();
    assert_eq!(records.len(), 2);

    // A second resend gets its own sequence number.
    let again = dispatcher.resend(appointment.id, EventType::Created).await.unwrap();
    assert_eq!(again.idempotency_key, format!("appointment:{}:created:r2", appointment.id.0));
}

#[tokio::test]
async fn retry_revives_a_failed_record_with_history_intact() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let ep = endpoint(Some(server.uri()));
    let dispatcher = env.dispatcher(ep.clone());
    let engine = env.engine(ep, one_shot_config());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    let failed =
        env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()[0].clone();
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.attempts, 1);

    let revived = dispatcher.retry_delivery(failed.id).await.unwrap();
    assert_eq!(revived.status, DeliveryStatus::Queued);
    assert_eq!(revived.attempts, 1, "attempt history survives the reset");

    // Re-enters the pipeline at the worker claim step.
    assert_eq!(engine.process_batch().await.unwrap(), 1);
    let after = env.delivery_ledger.find(failed.id).await.unwrap().unwrap();
    assert_eq!(after.attempts, 2);
}

#[tokio::test]
async fn retry_is_rejected_for_sent_records() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let ep = endpoint(Some(server.uri()));
    let dispatcher = env.dispatcher(ep.clone());
    let engine = env.engine(ep, one_shot_config());

    dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    engine.process_batch().await.unwrap();

    let sent =
        env.delivery_ledger.records_for_appointment(appointment.id).await.unwrap()[0].clone();
    assert_eq!(sent.status, DeliveryStatus::Sent);

    let err = dispatcher.retry_delivery(sent.id).await.unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));
}

#[tokio::test]
async fn retry_revives_a_record_parked_without_an_endpoint() {
    let env = TestEnv::new();
    let appointment = book_appointment(&env).await;

    // Parked while no endpoint was configured.
    let parked_dispatcher = env.dispatcher(endpoint(None));
    let parked = parked_dispatcher.deliver(appointment.id, EventType::Created).await.unwrap();
    assert_eq!(parked.status, DeliveryStatus::PendingNoEndpoint);

    // Endpoint configured later; operator retries the parked record.
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let ep = endpoint(Some(server.uri()));
    let dispatcher = env.dispatcher(ep.clone());
    let engine = env.engine(ep, one_shot_config());

    dispatcher.retry_delivery(parked.id).await.unwrap();
    assert_eq!(engine.process_batch().await.unwrap(), 1);

    let after = env.delivery_ledger.find(parked.id).await.unwrap().unwrap();
    assert_eq!(after.status, DeliveryStatus::Sent);

    server.verify().await;
}
