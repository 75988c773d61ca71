//! Storage ports for the booking and delivery pipelines.
//!
//! Trait-based abstractions keep the domain logic testable without a
//! database. Production uses the PostgreSQL implementations; tests use the
//! deterministic in-memory ones. Both enforce the same invariants:
//! conditional slot uniqueness in the slot ledger and global idempotency-key
//! uniqueness in the delivery ledger.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};

use crate::{
    error::Result,
    models::{
        Appointment, AppointmentId, AppointmentStatus, Cancellation, Customer, CustomerId,
        DeliveryRecord, DeliveryRecordId, DeliveryStatus, EventType, Salon, SalonId, Service,
        ServiceId, Stylist, StylistId, WorkingHours,
    },
};

pub use memory::{MemoryDeliveryLedger, MemoryDirectory, MemorySlotLedger};
pub use postgres::{run_migrations, PgDeliveryLedger, PgDirectory, PgSlotLedger};

/// Durable store of appointments and the slot-uniqueness invariant.
///
/// `insert` is the only way an active slot row comes into existence; it is an
/// atomic find-or-insert with conflict signaling, so concurrent bookings for
/// the same (stylist, date, time) race inside the store and exactly one wins.
#[async_trait::async_trait]
pub trait SlotLedger: Send + Sync {
    /// Atomically inserts a new appointment.
    ///
    /// Fails with `CoreError::Conflict("slot_taken")` when another active
    /// appointment already holds the slot. There is no read-then-write
    /// window: the uniqueness check and the insert are one operation.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment>;

    /// Finds an appointment by ID.
    async fn find(&self, id: AppointmentId) -> Result<Option<Appointment>>;

    /// Applies a status transition, releasing the slot when the new status
    /// no longer occupies it.
    ///
    /// Transition legality is the lifecycle state machine's concern; the
    /// ledger only persists the result.
    async fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
        cancellation: Option<Cancellation>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment>;

    /// Times held by active appointments for a stylist on a date, ascending.
    async fn booked_times(&self, stylist_id: StylistId, date: NaiveDate) -> Result<Vec<NaiveTime>>;

    /// Sets the delivery flag for a lifecycle event after terminal delivery
    /// success. The only appointment mutation the dispatcher performs.
    async fn mark_event_sent(&self, id: AppointmentId, event_type: EventType) -> Result<()>;

    /// Total appointments ever booked by a customer (any status).
    async fn count_for_customer(&self, customer_id: CustomerId) -> Result<u64>;
}

/// Outcome of one delivery attempt, applied to a record in a single update.
///
/// The ledger increments the attempts counter and stamps the last-attempt
/// timestamp exactly once per applied outcome, whatever the branch.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    /// Status the record transitions to.
    pub status: DeliveryStatus,
    /// HTTP status code, when a response was received.
    pub response_code: Option<i32>,
    /// Response body, truncated upstream.
    pub response_body: Option<String>,
    /// Transport or classification error, when no usable response arrived.
    pub error_message: Option<String>,
    /// Due time of the scheduled retry, when the outcome is a requeue.
    pub next_attempt_at: Option<DateTime<Utc>>,
    /// When the attempt happened.
    pub attempted_at: DateTime<Utc>,
}

/// Durable record of outbound event delivery attempts, keyed by idempotency
/// key.
///
/// Records are append-or-mutate: retries and operator commands mutate the
/// existing row; nothing ever deletes one. Re-running delivery for a key can
/// never create a second canonical row.
#[async_trait::async_trait]
pub trait DeliveryLedger: Send + Sync {
    /// Atomic get-or-create on the idempotency key, first write wins.
    ///
    /// Returns the stored record and whether this call created it. When the
    /// key already exists the provided record is discarded, preserving the
    /// original payload snapshot.
    async fn get_or_create(&self, record: DeliveryRecord) -> Result<(DeliveryRecord, bool)>;

    /// Finds a record by ID.
    async fn find(&self, id: DeliveryRecordId) -> Result<Option<DeliveryRecord>>;

    /// Finds a record by its idempotency key.
    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<DeliveryRecord>>;

    /// All records for an appointment, oldest first. Audit surface.
    async fn records_for_appointment(&self, id: AppointmentId) -> Result<Vec<DeliveryRecord>>;

    /// Claims due queued records for processing.
    ///
    /// The claim is the lock-scoped `Queued -> Sending` transition that keeps
    /// at most one attempt in flight per key. The lock covers only the
    /// transition, never the network call that follows.
    async fn claim_due(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<DeliveryRecord>>;

    /// Applies an attempt outcome: increments attempts, stamps the attempt
    /// time, and transitions status in one update.
    async fn record_attempt(
        &self,
        id: DeliveryRecordId,
        outcome: AttemptOutcome,
    ) -> Result<DeliveryRecord>;

    /// Resets a record to `Queued`, due at the given time.
    ///
    /// Operator path only; attempt history is preserved. Eligibility checks
    /// (never revive a sent record) live with the caller.
    async fn requeue(&self, id: DeliveryRecordId, due_at: DateTime<Utc>) -> Result<DeliveryRecord>;
}

/// Read-only port onto customer/salon/stylist/service data.
///
/// CRUD for these entities lives in an upstream system; booking and delivery
/// only ever read them.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Finds a customer by ID.
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>>;

    /// Finds a stylist by ID.
    async fn find_stylist(&self, id: StylistId) -> Result<Option<Stylist>>;

    /// Finds a salon by ID.
    async fn find_salon(&self, id: SalonId) -> Result<Option<Salon>>;

    /// Finds a service by ID.
    async fn find_service(&self, id: ServiceId) -> Result<Option<Service>>;

    /// Active working window for a stylist on a weekday, if configured.
    async fn working_hours(
        &self,
        stylist_id: StylistId,
        weekday: Weekday,
    ) -> Result<Option<WorkingHours>>;
}
