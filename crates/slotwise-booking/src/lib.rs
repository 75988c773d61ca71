//! Booking engine: slot reservation, availability, and lifecycle control.
//!
//! Sits between the HTTP surface and the slot ledger. Everything here is
//! synchronous with the caller; the asynchronous delivery pipeline hangs off
//! the domain events emitted after commits.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod notify;

pub use availability::{generate_time_slots, Availability, AvailabilityCalculator};
pub use booking::{BookingPolicy, BookingRequest, BookingService};
pub use lifecycle::AppointmentLifecycle;
pub use notify::{NoopNotifier, Notifier};
