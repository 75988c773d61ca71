//! Direct notification port.
//!
//! Cancellations notify the customer immediately over whatever channel they
//! linked; transport details live upstream. Distinct from the webhook
//! pipeline: no ledger, no retries, best effort.

use slotwise_core::{calendar, Appointment, Customer, Salon, Stylist};

/// Sends a short text to a notification channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers `text` to `channel_id`. Returns whether the send succeeded.
    async fn notify(&self, channel_id: &str, text: &str) -> bool;
}

/// Notifier that drops every message. Default when no transport is wired.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _channel_id: &str, _text: &str) -> bool {
        true
    }
}

/// Builds the cancellation notification text.
///
/// Dates are shown in the Persian calendar, matching every other
/// customer-facing surface.
pub fn cancellation_message(
    appointment: &Appointment,
    customer: &Customer,
    stylist: &Stylist,
    salon: &Salon,
    reason: Option<&str>,
) -> String {
    let mut text = format!(
        "Appointment cancelled\n\
         Customer: {}\n\
         Salon: {}\n\
         Stylist: {}\n\
         Date: {}\n\
         Time: {}",
        customer.full_name(),
        salon.name,
        stylist.full_name(),
        calendar::persian_date_string(appointment.date),
        appointment.time.format("%H:%M"),
    );
    if let Some(reason) = reason {
        text.push_str("\nReason: ");
        text.push_str(reason);
    }
    text
}
