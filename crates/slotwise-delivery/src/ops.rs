//! Operator commands for manual delivery intervention.
//!
//! Records that exhausted their retries (or were parked without an endpoint)
//! only move again when an operator says so. `retry` revives the existing
//! record; `resend` cuts a fresh one with a fresh snapshot. Both re-enter the
//! normal worker pipeline; neither bypasses the idempotency bookkeeping.

use slotwise_core::{
    error::{CoreError, Result},
    idempotency_key,
    storage::DeliveryLedger,
    AppointmentId, DeliveryRecord, DeliveryRecordId, DeliveryStatus, EventType,
};
use tracing::{info, instrument};

use crate::dispatcher::Dispatcher;

impl Dispatcher {
    /// Retries an existing delivery record.
    ///
    /// Resets the record to `Queued`, due immediately; workers pick it up at
    /// the claim step with its attempt history intact. Rejected for records
    /// that already succeeded or are mid-flight.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown records; `Conflict` for `Sent` or `Sending`
    /// records.
    #[instrument(skip(self), fields(record_id = %record_id))]
    pub async fn retry_delivery(&self, record_id: DeliveryRecordId) -> Result<DeliveryRecord> {
        let record = self
            .delivery_ledger()
            .find(record_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("delivery record {record_id}")))?;

        match record.status {
            DeliveryStatus::Sent => {
                return Err(CoreError::conflict(
                    "delivery already sent; use resend for a fresh webhook",
                ))
            },
            DeliveryStatus::Sending => {
                return Err(CoreError::conflict("delivery attempt currently in flight"))
            },
            DeliveryStatus::Queued
            | DeliveryStatus::Failed
            | DeliveryStatus::PendingNoEndpoint => {},
        }

        let requeued = self.delivery_ledger().requeue(record_id, self.now()).await?;

        info!(
            record_id = %record_id,
            previous_attempts = record.attempts,
            "delivery record requeued by operator"
        );

        Ok(requeued)
    }

    /// Resends an event for an appointment as a brand-new delivery record.
    ///
    /// Allowed only once the canonical record for the key is terminal
    /// (`Sent` or `Failed`); a non-terminal record means the pipeline is
    /// still working and a concurrent resend would race it. The new record
    /// carries a resend-sequence key and a freshly built payload snapshot.
    ///
    /// # Errors
    ///
    /// `Conflict` while the canonical record is non-terminal; `NotFound`
    /// when the appointment no longer resolves.
    #[instrument(skip(self), fields(appointment_id = %appointment_id, event_type = %event_type))]
    pub async fn resend(
        &self,
        appointment_id: AppointmentId,
        event_type: EventType,
    ) -> Result<DeliveryRecord> {
        let canonical_key = idempotency_key(appointment_id, event_type);

        if let Some(canonical) = self.delivery_ledger().find_by_key(&canonical_key).await? {
            if !canonical.status.is_terminal() {
                return Err(CoreError::conflict(format!(
                    "delivery for {canonical_key} is {}; resend requires a terminal record",
                    canonical.status
                )));
            }
        }

        let seq = self.next_resend_seq(appointment_id, event_type).await?;
        let key = DeliveryRecord::resend_key(appointment_id, event_type, seq);

        let record = self.build_record(appointment_id, event_type, key).await?;
        let (stored, created) = self.delivery_ledger().get_or_create(record).await?;

        if created {
            info!(
                idempotency_key = %stored.idempotency_key,
                "operator resend scheduled"
            );
        }

        Ok(stored)
    }

    async fn next_resend_seq(
        &self,
        appointment_id: AppointmentId,
        event_type: EventType,
    ) -> Result<u32> {
        let prefix = format!("{}:r", idempotency_key(appointment_id, event_type));
        let existing = self
            .delivery_ledger()
            .records_for_appointment(appointment_id)
            .await?
            .into_iter()
            .filter(|r| r.event_type == event_type && r.idempotency_key.starts_with(&prefix))
            .count();
        Ok(existing as u32 + 1)
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock_now()
    }
}
