//! In-memory storage implementations.
//!
//! Deterministic stores for tests and single-process deployments. The slot
//! ledger keeps an occupancy table keyed by the slot tuple behind one lock,
//! so check-and-insert is a single critical section and concurrent bookings
//! serialize exactly as they would against the database constraint.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use tokio::sync::RwLock;

use super::{AttemptOutcome, DeliveryLedger, Directory, SlotLedger};
use crate::{
    error::{CoreError, Result},
    models::{
        Appointment, AppointmentId, AppointmentStatus, Cancellation, Customer, CustomerId,
        DeliveryRecord, DeliveryRecordId, DeliveryStatus, EventType, Salon, SalonId, Service,
        ServiceId, Stylist, StylistId, WorkingHours,
    },
};

type SlotKey = (StylistId, NaiveDate, NaiveTime);

#[derive(Default)]
struct SlotState {
    appointments: HashMap<AppointmentId, Appointment>,
    /// Occupancy lock table: one entry per actively held slot.
    occupancy: HashMap<SlotKey, AppointmentId>,
}

/// In-memory slot ledger.
#[derive(Default)]
pub struct MemorySlotLedger {
    state: RwLock<SlotState>,
}

impl MemorySlotLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SlotLedger for MemorySlotLedger {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment> {
        let mut state = self.state.write().await;
        let key = (appointment.stylist_id, appointment.date, appointment.time);

        if appointment.status.is_active() {
            if let Some(holder) = state.occupancy.get(&key) {
                // Occupancy entries are removed on release; any entry that
                // still resolves to an active appointment wins the race.
                let held = state
                    .appointments
                    .get(holder)
                    .is_some_and(|existing| existing.status.is_active());
                if held {
                    return Err(CoreError::slot_taken());
                }
            }
            state.occupancy.insert(key, appointment.id);
        }

        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find(&self, id: AppointmentId) -> Result<Option<Appointment>> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
        cancellation: Option<Cancellation>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment> {
        let mut state = self.state.write().await;

        let slot_key = {
            let appointment = state
                .appointments
                .get_mut(&id)
                .ok_or_else(|| CoreError::not_found(format!("appointment {id}")))?;
            appointment.status = status;
            appointment.updated_at = updated_at;
            if let Some(cancellation) = cancellation {
                appointment.cancellation = Some(cancellation);
            }
            (appointment.stylist_id, appointment.date, appointment.time)
        };

        if !status.is_active() && state.occupancy.get(&slot_key) == Some(&id) {
            state.occupancy.remove(&slot_key);
        }

        Ok(state.appointments[&id].clone())
    }

    async fn booked_times(&self, stylist_id: StylistId, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let state = self.state.read().await;
        let mut times: Vec<NaiveTime> = state
            .appointments
            .values()
            .filter(|a| a.stylist_id == stylist_id && a.date == date && a.status.is_active())
            .map(|a| a.time)
            .collect();
        times.sort();
        Ok(times)
    }

    async fn mark_event_sent(&self, id: AppointmentId, event_type: EventType) -> Result<()> {
        let mut state = self.state.write().await;
        let appointment = state
            .appointments
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("appointment {id}")))?;
        match event_type {
            EventType::Created => appointment.event_created_sent = true,
            EventType::Confirmed => appointment.event_confirmed_sent = true,
        }
        Ok(())
    }

    async fn count_for_customer(&self, customer_id: CustomerId) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.appointments.values().filter(|a| a.customer_id == customer_id).count() as u64)
    }
}

#[derive(Default)]
struct DeliveryState {
    records: HashMap<DeliveryRecordId, DeliveryRecord>,
    by_key: HashMap<String, DeliveryRecordId>,
}

/// In-memory delivery ledger.
#[derive(Default)]
pub struct MemoryDeliveryLedger {
    state: RwLock<DeliveryState>,
}

impl MemoryDeliveryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record, oldest first. Test inspection helper.
    pub async fn all_records(&self) -> Vec<DeliveryRecord> {
        let state = self.state.read().await;
        let mut records: Vec<DeliveryRecord> = state.records.values().cloned().collect();
        records.sort_by_key(|r| r.created_at);
        records
    }
}

#[async_trait::async_trait]
impl DeliveryLedger for MemoryDeliveryLedger {
    async fn get_or_create(&self, record: DeliveryRecord) -> Result<(DeliveryRecord, bool)> {
        let mut state = self.state.write().await;

        if let Some(existing_id) = state.by_key.get(&record.idempotency_key) {
            let existing = state.records[existing_id].clone();
            return Ok((existing, false));
        }

        state.by_key.insert(record.idempotency_key.clone(), record.id);
        state.records.insert(record.id, record.clone());
        Ok((record, true))
    }

    async fn find(&self, id: DeliveryRecordId) -> Result<Option<DeliveryRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<DeliveryRecord>> {
        let state = self.state.read().await;
        Ok(state.by_key.get(idempotency_key).map(|id| state.records[id].clone()))
    }

    async fn records_for_appointment(&self, id: AppointmentId) -> Result<Vec<DeliveryRecord>> {
        let state = self.state.read().await;
        let mut records: Vec<DeliveryRecord> =
            state.records.values().filter(|r| r.appointment_id == id).cloned().collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn claim_due(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<DeliveryRecord>> {
        let mut state = self.state.write().await;

        let mut due: Vec<DeliveryRecordId> = state
            .records
            .values()
            .filter(|r| {
                r.status == DeliveryStatus::Queued
                    && r.next_attempt_at.map_or(true, |at| at <= now)
            })
            .map(|r| r.id)
            .collect();
        due.sort_by_key(|id| state.records[id].created_at);
        due.truncate(limit);

        let mut claimed = Vec::with_capacity(due.len());
        for id in due {
            if let Some(record) = state.records.get_mut(&id) {
                record.status = DeliveryStatus::Sending;
                claimed.push(record.clone());
            }
        }
        Ok(claimed)
    }

    async fn record_attempt(
        &self,
        id: DeliveryRecordId,
        outcome: AttemptOutcome,
    ) -> Result<DeliveryRecord> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("delivery record {id}")))?;

        record.attempts += 1;
        record.last_attempt_at = Some(outcome.attempted_at);
        record.status = outcome.status;
        record.response_code = outcome.response_code;
        if let Some(body) = outcome.response_body {
            record.response_body = Some(body);
        }
        record.error_message = outcome.error_message;
        record.next_attempt_at = outcome.next_attempt_at;

        Ok(record.clone())
    }

    async fn requeue(&self, id: DeliveryRecordId, due_at: DateTime<Utc>) -> Result<DeliveryRecord> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| CoreError::not_found(format!("delivery record {id}")))?;
        record.status = DeliveryStatus::Queued;
        record.next_attempt_at = Some(due_at);
        Ok(record.clone())
    }
}

#[derive(Default)]
struct DirectoryState {
    customers: HashMap<CustomerId, Customer>,
    stylists: HashMap<StylistId, Stylist>,
    salons: HashMap<SalonId, Salon>,
    services: HashMap<ServiceId, Service>,
    hours: Vec<WorkingHours>,
}

/// In-memory directory.
///
/// Upstream CRUD is out of scope; the insert methods exist so tests and
/// seeds can populate entries.
#[derive(Default)]
pub struct MemoryDirectory {
    state: RwLock<DirectoryState>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a customer entry.
    pub async fn insert_customer(&self, customer: Customer) {
        self.state.write().await.customers.insert(customer.id, customer);
    }

    /// Adds a stylist entry.
    pub async fn insert_stylist(&self, stylist: Stylist) {
        self.state.write().await.stylists.insert(stylist.id, stylist);
    }

    /// Adds a salon entry.
    pub async fn insert_salon(&self, salon: Salon) {
        self.state.write().await.salons.insert(salon.id, salon);
    }

    /// Adds a service entry.
    pub async fn insert_service(&self, service: Service) {
        self.state.write().await.services.insert(service.id, service);
    }

    /// Adds a working-hours window.
    pub async fn insert_working_hours(&self, hours: WorkingHours) {
        self.state.write().await.hours.push(hours);
    }
}

#[async_trait::async_trait]
impl Directory for MemoryDirectory {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        Ok(self.state.read().await.customers.get(&id).cloned())
    }

    async fn find_stylist(&self, id: StylistId) -> Result<Option<Stylist>> {
        Ok(self.state.read().await.stylists.get(&id).cloned())
    }

    async fn find_salon(&self, id: SalonId) -> Result<Option<Salon>> {
        Ok(self.state.read().await.salons.get(&id).cloned())
    }

    async fn find_service(&self, id: ServiceId) -> Result<Option<Service>> {
        Ok(self.state.read().await.services.get(&id).cloned())
    }

    async fn working_hours(
        &self,
        stylist_id: StylistId,
        weekday: Weekday,
    ) -> Result<Option<WorkingHours>> {
        let state = self.state.read().await;
        Ok(state
            .hours
            .iter()
            .find(|h| h.stylist_id == stylist_id && h.weekday == weekday && h.is_active)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;

    fn appointment(stylist_id: StylistId, time: NaiveTime) -> Appointment {
        let now = Utc::now();
        Appointment {
            id: AppointmentId::new(),
            customer_id: CustomerId::new(),
            stylist_id,
            service_id: ServiceId::new(),
            date: NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            time,
            status: AppointmentStatus::Pending,
            customer_notes: String::new(),
            admin_notes: String::new(),
            cancellation: None,
            event_created_sent: false,
            event_confirmed_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn record(key: &str) -> DeliveryRecord {
        DeliveryRecord {
            id: DeliveryRecordId::new(),
            appointment_id: AppointmentId::new(),
            event_type: EventType::Created,
            payload: json!({"probe": true}),
            status: DeliveryStatus::Queued,
            idempotency_key: key.to_string(),
            attempts: 0,
            last_attempt_at: None,
            response_code: None,
            response_body: None,
            error_message: None,
            next_attempt_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn second_insert_for_same_slot_conflicts() {
        let ledger = MemorySlotLedger::new();
        let stylist = StylistId::new();
        let time = NaiveTime::from_hms_opt(14, 0, 0).unwrap();

        ledger.insert(appointment(stylist, time)).await.unwrap();
        let err = ledger.insert(appointment(stylist, time)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(ref m) if m == "slot_taken"));
    }

    #[tokio::test]
    async fn cancelled_appointment_frees_the_slot() {
        let ledger = MemorySlotLedger::new();
        let stylist = StylistId::new();
        let time = NaiveTime::from_hms_opt(10, 30, 0).unwrap();

        let first = ledger.insert(appointment(stylist, time)).await.unwrap();
        ledger
            .update_status(first.id, AppointmentStatus::Cancelled, None, Utc::now())
            .await
            .unwrap();

        ledger.insert(appointment(stylist, time)).await.unwrap();
    }

    #[tokio::test]
    async fn get_or_create_is_first_write_wins() {
        let ledger = MemoryDeliveryLedger::new();
        let first = record("appointment:x:created");
        let mut second = record("appointment:x:created");
        second.payload = json!({"probe": false});

        let (stored, created) = ledger.get_or_create(first.clone()).await.unwrap();
        assert!(created);
        assert_eq!(stored.id, first.id);

        let (stored, created) = ledger.get_or_create(second).await.unwrap();
        assert!(!created);
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.payload, json!({"probe": true}));
    }

    #[tokio::test]
    async fn claim_due_transitions_to_sending() {
        let ledger = MemoryDeliveryLedger::new();
        let queued = record("appointment:y:created");
        ledger.get_or_create(queued.clone()).await.unwrap();

        let claimed = ledger.claim_due(10, Utc::now()).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, DeliveryStatus::Sending);

        // Already sending: nothing further to claim.
        let claimed = ledger.claim_due(10, Utc::now()).await.unwrap();
        assert!(claimed.is_empty());
    }

    #[tokio::test]
    async fn record_attempt_increments_exactly_once() {
        let ledger = MemoryDeliveryLedger::new();
        let (stored, _) = ledger.get_or_create(record("appointment:z:created")).await.unwrap();

        let now = Utc::now();
        let updated = ledger
            .record_attempt(stored.id, AttemptOutcome {
                status: DeliveryStatus::Sent,
                response_code: Some(200),
                response_body: Some("ok".to_string()),
                error_message: None,
                next_attempt_at: None,
                attempted_at: now,
            })
            .await
            .unwrap();

        assert_eq!(updated.attempts, 1);
        assert_eq!(updated.last_attempt_at, Some(now));
        assert_eq!(updated.status, DeliveryStatus::Sent);
    }
}
