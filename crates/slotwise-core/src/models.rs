//! Core domain models and strongly-typed identifiers.
//!
//! Defines appointments, delivery records, directory entities, and newtype ID
//! wrappers for compile-time type safety. Status enums carry the state
//! transition vocabulary for the booking and delivery pipelines.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Strongly-typed appointment identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. Appointments keep the
/// same ID through their entire lifecycle, including cancellation.
///
/// # Example
///
/// ```
/// use slotwise_core::models::AppointmentId;
/// let id = AppointmentId::new();
/// println!("booked appointment {id}");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub Uuid);

impl AppointmentId {
    /// Creates a new random appointment ID.
    ///
    /// Uses UUID v4 for globally unique identifiers without coordination.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AppointmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AppointmentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed delivery record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryRecordId(pub Uuid);

impl DeliveryRecordId {
    /// Creates a new random delivery record ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeliveryRecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DeliveryRecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed customer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub Uuid);

impl CustomerId {
    /// Creates a new random customer ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CustomerId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed stylist identifier.
///
/// The stylist is the resource whose time is partitioned into bookable slots;
/// the slot-uniqueness invariant is keyed by this ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StylistId(pub Uuid);

impl StylistId {
    /// Creates a new random stylist ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for StylistId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed salon identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SalonId(pub Uuid);

impl SalonId {
    /// Creates a new random salon ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SalonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SalonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SalonId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Strongly-typed service identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(pub Uuid);

impl ServiceId {
    /// Creates a new random service ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ServiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ServiceId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Appointment lifecycle status.
///
/// Transitions are forward-only and strictly controlled:
///
/// ```text
/// Pending -> Confirmed -> Completed
///        \            \-> Cancelled
///         \-> Cancelled
/// ```
///
/// `Pending` and `Confirmed` occupy a slot; `Completed` and `Cancelled` free
/// it for reuse. Only `Completed` appointments can be rated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Booked, awaiting salon approval.
    Pending,

    /// Approved by the salon (or auto-approved at booking time).
    Confirmed,

    /// Service was performed. Terminal; enables rating.
    Completed,

    /// Cancelled by the customer or a salon manager. Terminal.
    Cancelled,
}

impl AppointmentStatus {
    /// Whether this status occupies a slot.
    ///
    /// Active appointments block concurrent bookings for the same
    /// (stylist, date, time) tuple; terminal ones never do.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Confirmed, Self::Completed)
                | (Self::Confirmed, Self::Cancelled)
        )
    }

    /// Parses a status from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Lifecycle events propagated to the external automation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Appointment was booked (initial persistence).
    Created,
    /// Appointment entered `Confirmed` for the first time.
    Confirmed,
}

impl EventType {
    /// String form used in idempotency keys and payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parses an event type from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic idempotency key for an (appointment, event) delivery lineage.
///
/// Pure and stable: the same inputs always produce the same key, and keys for
/// different event types never collide. Retries of the same event reuse the
/// record stored under this key.
pub fn idempotency_key(appointment_id: AppointmentId, event_type: EventType) -> String {
    format!("appointment:{}:{}", appointment_id.0, event_type.as_str())
}

/// Role of the user performing an action.
///
/// Identity and permissions are managed upstream; the role travels with the
/// request so domain rules (manager cancellations need a reason) can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// The customer who owns the appointment.
    Customer,
    /// A salon manager.
    Manager,
}

impl ActorRole {
    /// Parses a role from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "manager" => Some(Self::Manager),
            _ => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Manager => write!(f, "manager"),
        }
    }
}

/// The user performing a lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Upstream identity of the actor.
    pub id: Uuid,
    /// Role the actor holds for this request.
    pub role: ActorRole,
}

impl Actor {
    /// Customer actor acting on their own appointments.
    pub fn customer(id: CustomerId) -> Self {
        Self { id: id.0, role: ActorRole::Customer }
    }

    /// Salon manager actor.
    pub fn manager(id: Uuid) -> Self {
        Self { id, role: ActorRole::Manager }
    }
}

/// Cancellation metadata recorded when an appointment is cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    /// When the cancellation happened.
    pub cancelled_at: DateTime<Utc>,
    /// Who cancelled.
    pub cancelled_by: Actor,
    /// Reason given. Mandatory for manager-initiated cancellations.
    pub reason: Option<String>,
}

/// A bookable unit of time: one stylist, one date, one starting time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    /// Stylist whose calendar the slot belongs to.
    pub stylist_id: StylistId,
    /// Calendar date of the slot.
    pub date: NaiveDate,
    /// Starting time of the slot.
    pub time: NaiveTime,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.stylist_id, self.date, self.time.format("%H:%M"))
    }
}

/// Core appointment entity.
///
/// Tracks the complete lifecycle from booking to completion or cancellation,
/// plus the per-event delivery flags the webhook dispatcher sets on terminal
/// delivery success.
///
/// # Slot uniqueness
///
/// At most one appointment with an active status may exist per
/// (stylist, date, time). The invariant is enforced by the slot ledger as a
/// conditional uniqueness constraint, never by read-then-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    /// Unique identifier for this appointment.
    pub id: AppointmentId,

    /// Customer who booked.
    pub customer_id: CustomerId,

    /// Stylist performing the service.
    pub stylist_id: StylistId,

    /// Service being booked.
    pub service_id: ServiceId,

    /// Appointment date (stored Gregorian, displayed Persian).
    pub date: NaiveDate,

    /// Appointment starting time.
    pub time: NaiveTime,

    /// Current lifecycle status.
    pub status: AppointmentStatus,

    /// Free-text note from the customer, length-bounded at booking time.
    pub customer_notes: String,

    /// Internal note editable by salon staff.
    pub admin_notes: String,

    /// Cancellation metadata, present only for cancelled appointments.
    pub cancellation: Option<Cancellation>,

    /// Whether the `created` lifecycle event reached the endpoint.
    pub event_created_sent: bool,

    /// Whether the `confirmed` lifecycle event reached the endpoint.
    pub event_confirmed_sent: bool,

    /// When the appointment was booked.
    pub created_at: DateTime<Utc>,

    /// When the appointment was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The slot tuple this appointment holds (or held, if terminal).
    pub fn slot(&self) -> Slot {
        Slot { stylist_id: self.stylist_id, date: self.date, time: self.time }
    }

    /// Whether the appointment can be rated. Only completed visits qualify.
    pub fn can_be_rated(&self) -> bool {
        self.status == AppointmentStatus::Completed
    }

    /// Appointment start as a timezone-aware instant (UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }

    /// Delivery flag for the given lifecycle event.
    pub fn event_sent(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Created => self.event_created_sent,
            EventType::Confirmed => self.event_confirmed_sent,
        }
    }
}

/// Delivery record lifecycle status.
///
/// ```text
/// Queued -> Sending -> Sent
///                  \-> Queued (scheduled retry)
///                  \-> Failed
/// PendingNoEndpoint   (no endpoint configured at schedule time)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Waiting for a worker (initial state or scheduled retry).
    Queued,

    /// Claimed by a worker; at most one attempt in flight per key.
    Sending,

    /// Delivered with a 2xx response. Terminal success.
    Sent,

    /// Permanently failed: 4xx response or retries exhausted. Terminal.
    Failed,

    /// No delivery endpoint was configured when the event was scheduled.
    ///
    /// Revivable only through an explicit operator retry.
    PendingNoEndpoint,
}

impl DeliveryStatus {
    /// Terminal statuses allow operator resend; non-terminal ones block it.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// Parses a status from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "sending" => Some(Self::Sending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "pending_no_endpoint" => Some(Self::PendingNoEndpoint),
            _ => None,
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Sending => write!(f, "sending"),
            Self::Sent => write!(f, "sent"),
            Self::Failed => write!(f, "failed"),
            Self::PendingNoEndpoint => write!(f, "pending_no_endpoint"),
        }
    }
}

/// Durable audit row tracking one idempotency key's delivery history.
///
/// Created when an event is first scheduled; mutated only by the webhook
/// dispatcher; never deleted. The payload snapshot is immutable once first
/// persisted so retries send exactly the bytes that were originally signed
/// off on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Unique identifier for this record.
    pub id: DeliveryRecordId,

    /// Appointment the event belongs to.
    pub appointment_id: AppointmentId,

    /// Lifecycle event being delivered.
    pub event_type: EventType,

    /// Immutable payload snapshot, serialized for signing and POSTing.
    pub payload: serde_json::Value,

    /// Current delivery status.
    pub status: DeliveryStatus,

    /// Globally unique key `appointment:{id}:{event}` (resends append `:rN`).
    pub idempotency_key: String,

    /// Number of delivery attempts made so far.
    pub attempts: u32,

    /// Timestamp of the most recent attempt.
    pub last_attempt_at: Option<DateTime<Utc>>,

    /// HTTP status of the last response, if one was received.
    pub response_code: Option<i32>,

    /// Last response body, truncated for storage.
    pub response_body: Option<String>,

    /// Last transport or classification error.
    pub error_message: Option<String>,

    /// When the next attempt is due. `None` once terminal.
    pub next_attempt_at: Option<DateTime<Utc>>,

    /// When the record was first persisted.
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Key for an operator-initiated resend of the same (appointment, event).
    ///
    /// Keeps the global key uniqueness invariant while letting the resend
    /// produce a fresh audit row.
    pub fn resend_key(appointment_id: AppointmentId, event_type: EventType, seq: u32) -> String {
        format!("{}:r{seq}", idempotency_key(appointment_id, event_type))
    }
}

/// Customer directory entry.
///
/// Identity and profile CRUD live upstream; booking and delivery only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Unique identifier.
    pub id: CustomerId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Phone number; always masked before leaving the system.
    pub phone: String,
    /// Notification channel (e.g. a messenger chat id), if linked.
    pub channel_id: Option<String>,
}

impl Customer {
    /// Full display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Stylist directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stylist {
    /// Unique identifier.
    pub id: StylistId,
    /// Salon the stylist works at.
    pub salon_id: SalonId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

impl Stylist {
    /// Full display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Salon directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Salon {
    /// Unique identifier.
    pub id: SalonId,
    /// Display name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// New bookings start `Confirmed` instead of `Pending` when set.
    pub auto_approve_appointments: bool,
}

/// Service directory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    /// Unique identifier.
    pub id: ServiceId,
    /// Salon offering the service.
    pub salon_id: SalonId,
    /// Display name.
    pub name: String,
    /// Price in tomans.
    pub price: i64,
    /// Duration of one booking.
    pub duration_minutes: u32,
}

/// One stylist's working window for a weekday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHours {
    /// Stylist the window applies to.
    pub stylist_id: StylistId,
    /// Weekday of the window.
    pub weekday: Weekday,
    /// Window start.
    pub start: NaiveTime,
    /// Window end (exclusive).
    pub end: NaiveTime,
    /// Inactive windows are ignored by the availability calculator.
    pub is_active: bool,
}
