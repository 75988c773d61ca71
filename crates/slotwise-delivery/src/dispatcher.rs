//! Event scheduling: from domain event to durable delivery record.
//!
//! The dispatcher runs synchronously with event emission and does everything
//! short of the network call: build the payload snapshot, derive the
//! idempotency key, and get-or-create the ledger record. Workers pick the
//! record up from there. A crash anywhere in between leaves at most one
//! record per key, and re-running the schedule step is a no-op.

use std::sync::Arc;

use slotwise_core::{
    error::{CoreError, Result},
    idempotency_key,
    storage::{DeliveryLedger, Directory, SlotLedger},
    Appointment, AppointmentEvent, AppointmentId, Clock, Customer, DeliveryRecord,
    DeliveryRecordId, DeliveryStatus, EventHandler, EventType, Salon, Service, Stylist,
};
use tracing::{error, info, instrument};

use crate::payload::build_payload;

/// Webhook endpoint configuration.
///
/// One endpoint per deployment; the URL being absent is a legal state that
/// parks deliveries as `PendingNoEndpoint` instead of failing them.
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// Destination URL, if configured.
    pub url: Option<String>,
    /// Shared secret for HMAC signing.
    pub secret: String,
    /// Name of the header carrying the signature.
    pub signature_header: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: String::new(),
            signature_header: "X-Webhook-Signature".to_string(),
        }
    }
}

/// Everything a payload needs, loaded in one pass.
struct PayloadSources {
    appointment: Appointment,
    customer: Customer,
    salon: Salon,
    stylist: Stylist,
    service: Service,
    is_first_time_customer: bool,
}

/// Schedules lifecycle events for delivery.
pub struct Dispatcher {
    slot_ledger: Arc<dyn SlotLedger>,
    delivery_ledger: Arc<dyn DeliveryLedger>,
    directory: Arc<dyn Directory>,
    endpoint: EndpointConfig,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new(
        slot_ledger: Arc<dyn SlotLedger>,
        delivery_ledger: Arc<dyn DeliveryLedger>,
        directory: Arc<dyn Directory>,
        endpoint: EndpointConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { slot_ledger, delivery_ledger, directory, endpoint, clock }
    }

    /// The delivery ledger this dispatcher writes to.
    pub fn delivery_ledger(&self) -> &Arc<dyn DeliveryLedger> {
        &self.delivery_ledger
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub(crate) fn clock_now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Schedules delivery of a lifecycle event.
    ///
    /// Builds the payload from current state, derives the idempotency key,
    /// and get-or-creates the delivery record: `Queued` and due immediately
    /// when an endpoint is configured, `PendingNoEndpoint` otherwise. First
    /// write wins — an existing record (whatever its status) is returned
    /// untouched, so duplicate emission never clobbers history.
    ///
    /// # Errors
    ///
    /// `NotFound` when the appointment or its related directory entries are
    /// missing; `Database` when the ledger write fails.
    #[instrument(skip(self), fields(appointment_id = %appointment_id, event_type = %event_type))]
    pub async fn deliver(
        &self,
        appointment_id: AppointmentId,
        event_type: EventType,
    ) -> Result<DeliveryRecord> {
        let key = idempotency_key(appointment_id, event_type);
        let record = self.build_record(appointment_id, event_type, key).await?;
        let no_endpoint = record.status == DeliveryStatus::PendingNoEndpoint;

        let (stored, created) = self.delivery_ledger.get_or_create(record).await?;

        if created {
            if no_endpoint {
                info!(
                    idempotency_key = %stored.idempotency_key,
                    "no webhook endpoint configured, delivery parked"
                );
            } else {
                info!(idempotency_key = %stored.idempotency_key, "delivery scheduled");
            }
        }

        Ok(stored)
    }

    /// Builds a fresh record for the given key from current state.
    pub(crate) async fn build_record(
        &self,
        appointment_id: AppointmentId,
        event_type: EventType,
        idempotency_key: String,
    ) -> Result<DeliveryRecord> {
        let sources = self.load_sources(appointment_id).await?;
        let now = self.clock.now();

        let payload = build_payload(
            &sources.appointment,
            &sources.customer,
            &sources.salon,
            &sources.stylist,
            &sources.service,
            event_type,
            sources.is_first_time_customer,
            now,
        );
        let payload = serde_json::to_value(&payload)
            .map_err(|e| CoreError::database(format!("payload serialization failed: {e}")))?;

        let (status, next_attempt_at, error_message) = if self.endpoint.url.is_some() {
            (DeliveryStatus::Queued, Some(now), None)
        } else {
            (
                DeliveryStatus::PendingNoEndpoint,
                None,
                Some("no webhook endpoint configured".to_string()),
            )
        };

        Ok(DeliveryRecord {
            id: DeliveryRecordId::new(),
            appointment_id,
            event_type,
            payload,
            status,
            idempotency_key,
            attempts: 0,
            last_attempt_at: None,
            response_code: None,
            response_body: None,
            error_message,
            next_attempt_at,
            created_at: now,
        })
    }

    async fn load_sources(&self, appointment_id: AppointmentId) -> Result<PayloadSources> {
        let appointment = self
            .slot_ledger
            .find(appointment_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("appointment {appointment_id}")))?;

        let customer = self
            .directory
            .find_customer(appointment.customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("customer {}", appointment.customer_id)))?;

        let stylist = self
            .directory
            .find_stylist(appointment.stylist_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("stylist {}", appointment.stylist_id)))?;

        let salon = self
            .directory
            .find_salon(stylist.salon_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("salon {}", stylist.salon_id)))?;

        let service = self
            .directory
            .find_service(appointment.service_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("service {}", appointment.service_id)))?;

        // The freshly booked appointment is already in the ledger, so a
        // first-timer counts exactly one.
        let bookings = self.slot_ledger.count_for_customer(appointment.customer_id).await?;
        let is_first_time_customer = bookings <= 1;

        Ok(PayloadSources {
            appointment,
            customer,
            salon,
            stylist,
            service,
            is_first_time_customer,
        })
    }
}

/// Post-commit subscriber bridging domain events into the delivery pipeline.
///
/// Scheduling failures are logged and absorbed: the booking already
/// committed, and delivery problems are observable through the ledger, never
/// through the booking caller.
#[derive(Clone)]
pub struct DeliveryEventHandler {
    dispatcher: Arc<Dispatcher>,
}

impl DeliveryEventHandler {
    /// Creates a handler scheduling through the given dispatcher.
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

impl std::fmt::Debug for DeliveryEventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryEventHandler").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl EventHandler for DeliveryEventHandler {
    async fn handle_event(&self, event: AppointmentEvent) {
        let appointment_id = event.appointment_id();
        let event_type = event.event_type();

        if let Err(e) = self.dispatcher.deliver(appointment_id, event_type).await {
            error!(
                appointment_id = %appointment_id,
                event_type = %event_type,
                error = %e,
                "failed to schedule webhook delivery"
            );
        }
    }
}
