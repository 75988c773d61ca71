//! Booking service: validated, atomic slot reservation.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use slotwise_core::{
    error::{CoreError, Result},
    storage::{Directory, SlotLedger},
    Appointment, AppointmentEvent, AppointmentId, AppointmentStatus, Clock, CustomerId,
    EventHandler, ServiceId, StylistId,
};
use tracing::{info, instrument};

/// Booking-time policy knobs. Values come from configuration, not code.
#[derive(Debug, Clone)]
pub struct BookingPolicy {
    /// How far into the past a requested start may lie and still be accepted.
    ///
    /// Covers clock skew between the customer's device and the server.
    pub grace: Duration,
    /// Maximum accepted length of the customer note.
    pub notes_max_chars: usize,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self { grace: Duration::minutes(5), notes_max_chars: 500 }
    }
}

/// A validated booking request.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Customer making the booking.
    pub customer_id: CustomerId,
    /// Stylist whose slot is requested.
    pub stylist_id: StylistId,
    /// Service to book.
    pub service_id: ServiceId,
    /// Requested date.
    pub date: NaiveDate,
    /// Requested starting time.
    pub time: NaiveTime,
    /// Optional free-text note from the customer.
    pub notes: Option<String>,
}

/// Books appointments against the slot ledger.
///
/// The uniqueness check and the insert are one atomic storage operation;
/// concurrent requests for the same slot race there and exactly one wins.
/// The loser's `Conflict("slot_taken")` is a user-visible answer, not
/// something to retry internally.
pub struct BookingService {
    slot_ledger: Arc<dyn SlotLedger>,
    directory: Arc<dyn Directory>,
    events: Arc<dyn EventHandler>,
    clock: Arc<dyn Clock>,
    policy: BookingPolicy,
}

impl BookingService {
    /// Creates a booking service.
    pub fn new(
        slot_ledger: Arc<dyn SlotLedger>,
        directory: Arc<dyn Directory>,
        events: Arc<dyn EventHandler>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self { slot_ledger, directory, events, clock, policy }
    }

    /// Books an appointment.
    ///
    /// Validates the request, atomically inserts the appointment (status
    /// `Pending`, or `Confirmed` when the salon auto-approves), and emits the
    /// `Created` domain event after the insert has durably committed. A
    /// failed insert emits nothing and schedules nothing.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the stylist, service, salon, or customer is missing
    /// - `Validation` for cross-salon services, past start times, or
    ///   oversized notes
    /// - `Conflict("slot_taken")` when another active appointment holds the
    ///   slot
    #[instrument(skip(self, request), fields(stylist_id = %request.stylist_id, date = %request.date))]
    pub async fn book(&self, request: BookingRequest) -> Result<Appointment> {
        let salon = self.validate(&request).await?;

        let status = if salon.auto_approve_appointments {
            AppointmentStatus::Confirmed
        } else {
            AppointmentStatus::Pending
        };

        let now = self.clock.now();
        let appointment = Appointment {
            id: AppointmentId::new(),
            customer_id: request.customer_id,
            stylist_id: request.stylist_id,
            service_id: request.service_id,
            date: request.date,
            time: request.time,
            status,
            customer_notes: request.notes.unwrap_or_default(),
            admin_notes: String::new(),
            cancellation: None,
            event_created_sent: false,
            event_confirmed_sent: false,
            created_at: now,
            updated_at: now,
        };

        let appointment = self.slot_ledger.insert(appointment).await?;

        info!(
            appointment_id = %appointment.id,
            status = %appointment.status,
            "appointment booked"
        );

        // Post-commit: the insert above is the durable unit of work. Nothing
        // is announced for bookings that did not persist.
        self.events
            .handle_event(AppointmentEvent::Created {
                appointment_id: appointment.id,
                occurred_at: now,
            })
            .await;

        Ok(appointment)
    }

    /// Checks every precondition and returns the salon for the auto-approval
    /// decision.
    async fn validate(&self, request: &BookingRequest) -> Result<slotwise_core::Salon> {
        self.directory
            .find_customer(request.customer_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("customer {}", request.customer_id)))?;

        let stylist = self
            .directory
            .find_stylist(request.stylist_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("stylist {}", request.stylist_id)))?;

        let service = self
            .directory
            .find_service(request.service_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("service {}", request.service_id)))?;

        if service.salon_id != stylist.salon_id {
            return Err(CoreError::validation(
                "service is not offered at this stylist's salon",
            ));
        }

        let salon = self
            .directory
            .find_salon(stylist.salon_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("salon {}", stylist.salon_id)))?;

        let starts_at = request.date.and_time(request.time).and_utc();
        if starts_at < self.clock.now() - self.policy.grace {
            return Err(CoreError::validation("appointment must be in the future"));
        }

        if let Some(notes) = &request.notes {
            if notes.chars().count() > self.policy.notes_max_chars {
                return Err(CoreError::validation(format!(
                    "notes exceed {} characters",
                    self.policy.notes_max_chars
                )));
            }
        }

        Ok(salon)
    }
}
