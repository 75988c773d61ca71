//! Core domain models, storage ports, and event types.
//!
//! Provides strongly-typed domain primitives, the error taxonomy, domain
//! event definitions, and the storage abstractions behind the booking and
//! delivery pipelines. All other crates depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calendar;
pub mod error;
pub mod events;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use events::{AppointmentEvent, EventHandler, MulticastEventHandler, NoOpEventHandler};
pub use models::{
    idempotency_key, Actor, ActorRole, Appointment, AppointmentId, AppointmentStatus,
    Cancellation, Customer, CustomerId, DeliveryRecord, DeliveryRecordId, DeliveryStatus,
    EventType, Salon, SalonId, Service, ServiceId, Slot, Stylist, StylistId, WorkingHours,
};
pub use time::{Clock, RealClock, TestClock};
