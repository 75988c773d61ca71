//! Shared application state for request handlers.

use std::sync::Arc;

use slotwise_booking::{AppointmentLifecycle, AvailabilityCalculator, BookingService};

/// Handler-facing service bundle.
///
/// Everything is behind `Arc`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Booking service.
    pub booking: Arc<BookingService>,
    /// Availability calculator.
    pub availability: Arc<AvailabilityCalculator>,
    /// Lifecycle state machine.
    pub lifecycle: Arc<AppointmentLifecycle>,
}

impl AppState {
    /// Bundles the services into one state value.
    pub fn new(
        booking: Arc<BookingService>,
        availability: Arc<AvailabilityCalculator>,
        lifecycle: Arc<AppointmentLifecycle>,
    ) -> Self {
        Self { booking, availability, lifecycle }
    }
}
