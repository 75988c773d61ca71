//! Appointment lifecycle state machine.
//!
//! Enforces the legal transition graph and emits domain events for
//! confirmations. Cancellations additionally fire a direct customer
//! notification; that path is best effort and never fails the transition.

use std::sync::Arc;

use slotwise_core::{
    error::{CoreError, Result},
    storage::{Directory, SlotLedger},
    Actor, ActorRole, Appointment, AppointmentEvent, AppointmentId, AppointmentStatus,
    Cancellation, Clock, EventHandler,
};
use tracing::{info, instrument, warn};

use crate::notify::{cancellation_message, Notifier};

/// Drives appointment status transitions.
pub struct AppointmentLifecycle {
    slot_ledger: Arc<dyn SlotLedger>,
    directory: Arc<dyn Directory>,
    events: Arc<dyn EventHandler>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl AppointmentLifecycle {
    /// Creates a lifecycle service.
    pub fn new(
        slot_ledger: Arc<dyn SlotLedger>,
        directory: Arc<dyn Directory>,
        events: Arc<dyn EventHandler>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { slot_ledger, directory, events, notifier, clock }
    }

    /// Confirms a pending appointment.
    ///
    /// The first transition into `Confirmed` emits a `Confirmed` domain
    /// event after the status change has committed. Confirming an
    /// already-confirmed appointment is a no-op and must not re-emit.
    #[instrument(skip(self), fields(appointment_id = %id))]
    pub async fn confirm(&self, id: AppointmentId, actor: Actor) -> Result<Appointment> {
        if actor.role != ActorRole::Manager {
            return Err(CoreError::permission("only salon managers confirm appointments"));
        }

        let appointment = self.load(id).await?;
        match appointment.status {
            // Idempotent re-entry: no state change, no event.
            AppointmentStatus::Confirmed => return Ok(appointment),
            AppointmentStatus::Pending => {},
            other => {
                return Err(CoreError::validation(format!(
                    "cannot confirm appointment in status {other}"
                )))
            },
        }

        let now = self.clock.now();
        let appointment = self
            .slot_ledger
            .update_status(id, AppointmentStatus::Confirmed, None, now)
            .await?;

        info!(appointment_id = %id, "appointment confirmed");

        self.events
            .handle_event(AppointmentEvent::Confirmed { appointment_id: id, occurred_at: now })
            .await;

        Ok(appointment)
    }

    /// Marks a confirmed appointment as completed.
    #[instrument(skip(self), fields(appointment_id = %id))]
    pub async fn complete(&self, id: AppointmentId, actor: Actor) -> Result<Appointment> {
        if actor.role != ActorRole::Manager {
            return Err(CoreError::permission("only salon managers complete appointments"));
        }

        let appointment = self.load(id).await?;
        if !appointment.status.can_transition_to(AppointmentStatus::Completed) {
            return Err(CoreError::validation(format!(
                "cannot complete appointment in status {}",
                appointment.status
            )));
        }

        let appointment = self
            .slot_ledger
            .update_status(id, AppointmentStatus::Completed, None, self.clock.now())
            .await?;

        info!(appointment_id = %id, "appointment completed");
        Ok(appointment)
    }

    /// Cancels an active appointment.
    ///
    /// Customers cancel their own appointments; managers cancel any, but must
    /// give a non-empty reason. Frees the slot for reuse and notifies the
    /// customer directly.
    #[instrument(skip(self, reason), fields(appointment_id = %id, actor_role = %actor.role))]
    pub async fn cancel(
        &self,
        id: AppointmentId,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<Appointment> {
        let appointment = self.load(id).await?;

        if actor.role == ActorRole::Customer && appointment.customer_id.0 != actor.id {
            return Err(CoreError::permission("customers may only cancel their own appointments"));
        }

        if !appointment.status.can_transition_to(AppointmentStatus::Cancelled) {
            return Err(CoreError::validation(format!(
                "cannot cancel appointment in status {}",
                appointment.status
            )));
        }

        let reason = reason.filter(|r| !r.trim().is_empty());
        if actor.role == ActorRole::Manager && reason.is_none() {
            return Err(CoreError::validation("reason required"));
        }

        let now = self.clock.now();
        let cancellation =
            Cancellation { cancelled_at: now, cancelled_by: actor, reason: reason.clone() };
        let appointment = self
            .slot_ledger
            .update_status(id, AppointmentStatus::Cancelled, Some(cancellation), now)
            .await?;

        info!(appointment_id = %id, "appointment cancelled");

        self.notify_cancellation(&appointment, reason.as_deref()).await;

        Ok(appointment)
    }

    async fn load(&self, id: AppointmentId) -> Result<Appointment> {
        self.slot_ledger
            .find(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("appointment {id}")))
    }

    /// Best-effort direct notification; failures are logged, never raised.
    async fn notify_cancellation(&self, appointment: &Appointment, reason: Option<&str>) {
        let lookup = async {
            let customer = self.directory.find_customer(appointment.customer_id).await?;
            let stylist = self.directory.find_stylist(appointment.stylist_id).await?;
            let salon = match &stylist {
                Some(stylist) => self.directory.find_salon(stylist.salon_id).await?,
                None => None,
            };
            Ok::<_, CoreError>((customer, stylist, salon))
        };

        let (customer, stylist, salon) = match lookup.await {
            Ok((Some(customer), Some(stylist), Some(salon))) => (customer, stylist, salon),
            Ok(_) => {
                warn!(appointment_id = %appointment.id, "cancellation notify skipped, incomplete directory data");
                return;
            },
            Err(error) => {
                warn!(appointment_id = %appointment.id, error = %error, "cancellation notify skipped");
                return;
            },
        };

        let Some(channel_id) = customer.channel_id.clone() else {
            return;
        };

        let text = cancellation_message(appointment, &customer, &stylist, &salon, reason);
        if !self.notifier.notify(&channel_id, &text).await {
            warn!(appointment_id = %appointment.id, "cancellation notification failed");
        }
    }
}
