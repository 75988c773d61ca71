//! PostgreSQL storage implementations.
//!
//! The slot-uniqueness invariant lives in a partial unique index over active
//! statuses, so concurrent bookings race inside the database and the loser
//! surfaces as a unique-constraint violation. Delivery claiming uses
//! `FOR UPDATE SKIP LOCKED` so workers never contend on the same rows.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{AttemptOutcome, DeliveryLedger, Directory, SlotLedger};
use crate::{
    error::{CoreError, Result},
    models::{
        Actor, ActorRole, Appointment, AppointmentId, AppointmentStatus, Cancellation, Customer,
        CustomerId, DeliveryRecord, DeliveryRecordId, DeliveryStatus, EventType, Salon, SalonId,
        Service, ServiceId, Stylist, StylistId, WorkingHours,
    },
};

/// Creates the schema when missing. Idempotent; safe to run at every boot.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS appointments (
            id UUID PRIMARY KEY,
            customer_id UUID NOT NULL,
            stylist_id UUID NOT NULL,
            service_id UUID NOT NULL,
            appointment_date DATE NOT NULL,
            appointment_time TIME NOT NULL,
            status TEXT NOT NULL,
            customer_notes TEXT NOT NULL DEFAULT '',
            admin_notes TEXT NOT NULL DEFAULT '',
            cancelled_at TIMESTAMPTZ,
            cancelled_by UUID,
            cancelled_by_role TEXT,
            cancellation_reason TEXT,
            event_created_sent BOOLEAN NOT NULL DEFAULT FALSE,
            event_confirmed_sent BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    // The double-booking guard. A plain unique index would let cancelled
    // appointments block their slot forever.
    sqlx::query(
        r"
        CREATE UNIQUE INDEX IF NOT EXISTS uniq_active_slot
        ON appointments (stylist_id, appointment_date, appointment_time)
        WHERE status IN ('pending', 'confirmed')
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_appointments_stylist_date
        ON appointments (stylist_id, appointment_date, status)
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS delivery_records (
            id UUID PRIMARY KEY,
            appointment_id UUID NOT NULL REFERENCES appointments(id),
            event_type TEXT NOT NULL,
            payload JSONB NOT NULL,
            status TEXT NOT NULL,
            idempotency_key TEXT NOT NULL UNIQUE,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_attempt_at TIMESTAMPTZ,
            response_code INTEGER,
            response_body TEXT,
            error_message TEXT,
            next_attempt_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE INDEX IF NOT EXISTS idx_delivery_records_due
        ON delivery_records (status, next_attempt_at)
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS customers (
            id UUID PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone TEXT NOT NULL,
            channel_id TEXT
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS salons (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            auto_approve_appointments BOOLEAN NOT NULL DEFAULT FALSE
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS stylists (
            id UUID PRIMARY KEY,
            salon_id UUID NOT NULL REFERENCES salons(id),
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS services (
            id UUID PRIMARY KEY,
            salon_id UUID NOT NULL REFERENCES salons(id),
            name TEXT NOT NULL,
            price BIGINT NOT NULL,
            duration_minutes INTEGER NOT NULL
        )
        ",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS working_hours (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            stylist_id UUID NOT NULL REFERENCES stylists(id),
            weekday SMALLINT NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT TRUE
        )
        ",
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn parse_appointment_status(s: &str) -> Result<AppointmentStatus> {
    AppointmentStatus::parse(s)
        .ok_or_else(|| CoreError::database(format!("invalid appointment status: {s}")))
}

fn parse_delivery_status(s: &str) -> Result<DeliveryStatus> {
    DeliveryStatus::parse(s)
        .ok_or_else(|| CoreError::database(format!("invalid delivery status: {s}")))
}

fn parse_event_type(s: &str) -> Result<EventType> {
    EventType::parse(s).ok_or_else(|| CoreError::database(format!("invalid event type: {s}")))
}

fn weekday_to_db(weekday: Weekday) -> i16 {
    weekday.num_days_from_monday() as i16
}

fn weekday_from_db(value: i16) -> Result<Weekday> {
    match value {
        0 => Ok(Weekday::Mon),
        1 => Ok(Weekday::Tue),
        2 => Ok(Weekday::Wed),
        3 => Ok(Weekday::Thu),
        4 => Ok(Weekday::Fri),
        5 => Ok(Weekday::Sat),
        6 => Ok(Weekday::Sun),
        _ => Err(CoreError::database(format!("invalid weekday: {value}"))),
    }
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment> {
    let status: String = row.try_get("status").map_err(CoreError::from)?;

    let cancelled_at: Option<DateTime<Utc>> = row.try_get("cancelled_at")?;
    let cancellation = match cancelled_at {
        Some(cancelled_at) => {
            let actor_id: Option<Uuid> = row.try_get("cancelled_by")?;
            let role: Option<String> = row.try_get("cancelled_by_role")?;
            let role = role
                .as_deref()
                .and_then(ActorRole::parse)
                .ok_or_else(|| CoreError::database("cancellation row missing actor role"))?;
            let actor_id =
                actor_id.ok_or_else(|| CoreError::database("cancellation row missing actor"))?;
            Some(Cancellation {
                cancelled_at,
                cancelled_by: Actor { id: actor_id, role },
                reason: row.try_get("cancellation_reason")?,
            })
        },
        None => None,
    };

    Ok(Appointment {
        id: AppointmentId(row.try_get("id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        stylist_id: StylistId(row.try_get("stylist_id")?),
        service_id: ServiceId(row.try_get("service_id")?),
        date: row.try_get("appointment_date")?,
        time: row.try_get("appointment_time")?,
        status: parse_appointment_status(&status)?,
        customer_notes: row.try_get("customer_notes")?,
        admin_notes: row.try_get("admin_notes")?,
        cancellation,
        event_created_sent: row.try_get("event_created_sent")?,
        event_confirmed_sent: row.try_get("event_confirmed_sent")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn delivery_record_from_row(row: &PgRow) -> Result<DeliveryRecord> {
    let status: String = row.try_get("status")?;
    let event_type: String = row.try_get("event_type")?;
    let attempts: i32 = row.try_get("attempts")?;

    Ok(DeliveryRecord {
        id: DeliveryRecordId(row.try_get("id")?),
        appointment_id: AppointmentId(row.try_get("appointment_id")?),
        event_type: parse_event_type(&event_type)?,
        payload: row.try_get("payload")?,
        status: parse_delivery_status(&status)?,
        idempotency_key: row.try_get("idempotency_key")?,
        attempts: u32::try_from(attempts).unwrap_or(0),
        last_attempt_at: row.try_get("last_attempt_at")?,
        response_code: row.try_get("response_code")?,
        response_body: row.try_get("response_body")?,
        error_message: row.try_get("error_message")?,
        next_attempt_at: row.try_get("next_attempt_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const APPOINTMENT_COLUMNS: &str = "id, customer_id, stylist_id, service_id, appointment_date, \
     appointment_time, status, customer_notes, admin_notes, cancelled_at, cancelled_by, \
     cancelled_by_role, cancellation_reason, event_created_sent, event_confirmed_sent, \
     created_at, updated_at";

const DELIVERY_COLUMNS: &str = "id, appointment_id, event_type, payload, status, \
     idempotency_key, attempts, last_attempt_at, response_code, response_body, error_message, \
     next_attempt_at, created_at";

/// PostgreSQL-backed slot ledger.
pub struct PgSlotLedger {
    pool: PgPool,
}

impl PgSlotLedger {
    /// Creates a ledger over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SlotLedger for PgSlotLedger {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment> {
        sqlx::query(
            r"
            INSERT INTO appointments (
                id, customer_id, stylist_id, service_id, appointment_date, appointment_time,
                status, customer_notes, admin_notes, event_created_sent, event_confirmed_sent,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(appointment.id.0)
        .bind(appointment.customer_id.0)
        .bind(appointment.stylist_id.0)
        .bind(appointment.service_id.0)
        .bind(appointment.date)
        .bind(appointment.time)
        .bind(appointment.status.to_string())
        .bind(&appointment.customer_notes)
        .bind(&appointment.admin_notes)
        .bind(appointment.event_created_sent)
        .bind(appointment.event_confirmed_sent)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::slot_taken(),
            _ => CoreError::from(e),
        })?;

        Ok(appointment)
    }

    async fn find(&self, id: AppointmentId) -> Result<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn update_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
        cancellation: Option<Cancellation>,
        updated_at: DateTime<Utc>,
    ) -> Result<Appointment> {
        let (cancelled_at, cancelled_by, cancelled_by_role, reason) = match &cancellation {
            Some(c) => (
                Some(c.cancelled_at),
                Some(c.cancelled_by.id),
                Some(c.cancelled_by.role.to_string()),
                c.reason.clone(),
            ),
            None => (None, None, None, None),
        };

        let row = sqlx::query(&format!(
            r"
            UPDATE appointments
            SET status = $2,
                updated_at = $3,
                cancelled_at = COALESCE($4, cancelled_at),
                cancelled_by = COALESCE($5, cancelled_by),
                cancelled_by_role = COALESCE($6, cancelled_by_role),
                cancellation_reason = COALESCE($7, cancellation_reason)
            WHERE id = $1
            RETURNING {APPOINTMENT_COLUMNS}
            ",
        ))
        .bind(id.0)
        .bind(status.to_string())
        .bind(updated_at)
        .bind(cancelled_at)
        .bind(cancelled_by)
        .bind(cancelled_by_role)
        .bind(reason)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("appointment {id}")))?;

        appointment_from_row(&row)
    }

    async fn booked_times(&self, stylist_id: StylistId, date: NaiveDate) -> Result<Vec<NaiveTime>> {
        let times: Vec<NaiveTime> = sqlx::query_scalar(
            r"
            SELECT appointment_time FROM appointments
            WHERE stylist_id = $1
              AND appointment_date = $2
              AND status IN ('pending', 'confirmed')
            ORDER BY appointment_time ASC
            ",
        )
        .bind(stylist_id.0)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(times)
    }

    async fn mark_event_sent(&self, id: AppointmentId, event_type: EventType) -> Result<()> {
        let column = match event_type {
            EventType::Created => "event_created_sent",
            EventType::Confirmed => "event_confirmed_sent",
        };

        let result =
            sqlx::query(&format!("UPDATE appointments SET {column} = TRUE WHERE id = $1"))
                .bind(id.0)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("appointment {id}")));
        }
        Ok(())
    }

    async fn count_for_customer(&self, customer_id: CustomerId) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE customer_id = $1")
                .bind(customer_id.0)
                .fetch_one(&self.pool)
                .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

/// PostgreSQL-backed delivery ledger.
pub struct PgDeliveryLedger {
    pool: PgPool,
}

impl PgDeliveryLedger {
    /// Creates a ledger over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl DeliveryLedger for PgDeliveryLedger {
    async fn get_or_create(&self, record: DeliveryRecord) -> Result<(DeliveryRecord, bool)> {
        let inserted = sqlx::query(
            r"
            INSERT INTO delivery_records (
                id, appointment_id, event_type, payload, status, idempotency_key,
                attempts, next_attempt_at, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (idempotency_key) DO NOTHING
            ",
        )
        .bind(record.id.0)
        .bind(record.appointment_id.0)
        .bind(record.event_type.as_str())
        .bind(&record.payload)
        .bind(record.status.to_string())
        .bind(&record.idempotency_key)
        .bind(i32::try_from(record.attempts).unwrap_or(0))
        .bind(record.next_attempt_at)
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        let stored = self
            .find_by_key(&record.idempotency_key)
            .await?
            .ok_or_else(|| CoreError::database("delivery record vanished after upsert"))?;

        Ok((stored, inserted))
    }

    async fn find(&self, id: DeliveryRecordId) -> Result<Option<DeliveryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery_records WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(delivery_record_from_row).transpose()
    }

    async fn find_by_key(&self, idempotency_key: &str) -> Result<Option<DeliveryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery_records WHERE idempotency_key = $1"
        ))
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(delivery_record_from_row).transpose()
    }

    async fn records_for_appointment(&self, id: AppointmentId) -> Result<Vec<DeliveryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {DELIVERY_COLUMNS} FROM delivery_records \
             WHERE appointment_id = $1 ORDER BY created_at ASC"
        ))
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(delivery_record_from_row).collect()
    }

    async fn claim_due(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<DeliveryRecord>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r"
            SELECT id FROM delivery_records
            WHERE status = 'queued'
              AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
            ORDER BY created_at ASC
            LIMIT $2
            FOR UPDATE SKIP LOCKED
            ",
        )
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "UPDATE delivery_records SET status = 'sending' \
             WHERE id = ANY($1) RETURNING {DELIVERY_COLUMNS}"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        rows.iter().map(delivery_record_from_row).collect()
    }

    async fn record_attempt(
        &self,
        id: DeliveryRecordId,
        outcome: AttemptOutcome,
    ) -> Result<DeliveryRecord> {
        let row = sqlx::query(&format!(
            r"
            UPDATE delivery_records
            SET attempts = attempts + 1,
                last_attempt_at = $2,
                status = $3,
                response_code = $4,
                response_body = COALESCE($5, response_body),
                error_message = $6,
                next_attempt_at = $7
            WHERE id = $1
            RETURNING {DELIVERY_COLUMNS}
            ",
        ))
        .bind(id.0)
        .bind(outcome.attempted_at)
        .bind(outcome.status.to_string())
        .bind(outcome.response_code)
        .bind(outcome.response_body)
        .bind(outcome.error_message)
        .bind(outcome.next_attempt_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("delivery record {id}")))?;

        delivery_record_from_row(&row)
    }

    async fn requeue(&self, id: DeliveryRecordId, due_at: DateTime<Utc>) -> Result<DeliveryRecord> {
        let row = sqlx::query(&format!(
            "UPDATE delivery_records SET status = 'queued', next_attempt_at = $2 \
             WHERE id = $1 RETURNING {DELIVERY_COLUMNS}"
        ))
        .bind(id.0)
        .bind(due_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found(format!("delivery record {id}")))?;

        delivery_record_from_row(&row)
    }
}

/// PostgreSQL-backed directory.
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    /// Creates a directory over the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Directory for PgDirectory {
    async fn find_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, phone, channel_id FROM customers WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Customer {
            id: CustomerId(row.get("id")),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            phone: row.get("phone"),
            channel_id: row.get("channel_id"),
        }))
    }

    async fn find_stylist(&self, id: StylistId) -> Result<Option<Stylist>> {
        let row =
            sqlx::query("SELECT id, salon_id, first_name, last_name FROM stylists WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|row| Stylist {
            id: StylistId(row.get("id")),
            salon_id: SalonId(row.get("salon_id")),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
        }))
    }

    async fn find_salon(&self, id: SalonId) -> Result<Option<Salon>> {
        let row = sqlx::query(
            "SELECT id, name, address, auto_approve_appointments FROM salons WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Salon {
            id: SalonId(row.get("id")),
            name: row.get("name"),
            address: row.get("address"),
            auto_approve_appointments: row.get("auto_approve_appointments"),
        }))
    }

    async fn find_service(&self, id: ServiceId) -> Result<Option<Service>> {
        let row = sqlx::query(
            "SELECT id, salon_id, name, price, duration_minutes FROM services WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Service {
            id: ServiceId(row.get("id")),
            salon_id: SalonId(row.get("salon_id")),
            name: row.get("name"),
            price: row.get("price"),
            duration_minutes: u32::try_from(row.get::<i32, _>("duration_minutes")).unwrap_or(0),
        }))
    }

    async fn working_hours(
        &self,
        stylist_id: StylistId,
        weekday: Weekday,
    ) -> Result<Option<WorkingHours>> {
        let row = sqlx::query(
            r"
            SELECT stylist_id, weekday, start_time, end_time, is_active
            FROM working_hours
            WHERE stylist_id = $1 AND weekday = $2 AND is_active = TRUE
            ORDER BY start_time ASC
            LIMIT 1
            ",
        )
        .bind(stylist_id.0)
        .bind(weekday_to_db(weekday))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(WorkingHours {
                stylist_id: StylistId(row.get("stylist_id")),
                weekday: weekday_from_db(row.get("weekday"))?,
                start: row.get("start_time"),
                end: row.get("end_time"),
                is_active: row.get("is_active"),
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekday_round_trips_through_db_encoding() {
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            assert_eq!(weekday_from_db(weekday_to_db(weekday)).unwrap(), weekday);
        }
    }

    #[test]
    fn out_of_range_weekday_rejected() {
        assert!(weekday_from_db(7).is_err());
        assert!(weekday_from_db(-1).is_err());
    }
}
