//! Webhook payload construction.
//!
//! Builds the JSON document delivered to the automation endpoint. Key names
//! are a wire contract with the receiving scenario and must not drift.
//! Customer phone numbers are masked before the payload ever leaves the
//! process.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use slotwise_core::{calendar, Appointment, Customer, EventType, Salon, Service, Stylist};

/// How the booking reached the system. Fixed for this surface.
const PAYLOAD_SOURCE: &str = "online_booking";

/// Masks a phone number, keeping the first four and last four digits.
///
/// `"09121234567"` becomes `"0912***4567"`. Inputs shorter than seven
/// characters carry too little to leak and are returned unchanged.
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    if chars.len() < 7 {
        return phone.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}***{tail}")
}

/// Customer block of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadCustomer {
    /// Customer ID as a string.
    pub id: String,
    /// Masked phone number.
    pub phone: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
}

/// Salon block of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadSalon {
    /// Salon ID as a string.
    pub id: String,
    /// Salon display name.
    pub name: String,
    /// Salon street address.
    pub address: String,
}

/// Stylist block of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadStylist {
    /// Stylist ID as a string.
    pub id: String,
    /// Stylist full name.
    pub name: String,
}

/// One service line of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadService {
    /// Service ID as a string.
    pub id: String,
    /// Service display name.
    pub name: String,
    /// Price in tomans, serialized as a string.
    pub price: String,
    /// Duration in minutes.
    pub duration_minutes: u32,
}

/// Metadata block of the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadMetadata {
    /// Whether this is the customer's first booking.
    pub is_first_time_customer: bool,
    /// Booking channel.
    pub source: String,
    /// Appointment date in the Persian calendar, `YYYY/MM/DD`.
    pub persian_date: String,
}

/// The webhook payload document.
///
/// Field order and names are bit-exact; the automation endpoint maps on key
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Appointment ID as a string.
    pub appointment_id: String,
    /// `"created"` or `"confirmed"`.
    pub event_type: String,
    /// When the event was emitted, ISO-8601.
    pub created_at: String,
    /// Customer details with masked phone.
    pub customer: PayloadCustomer,
    /// Salon details.
    pub salon: PayloadSalon,
    /// Stylist details.
    pub stylist: PayloadStylist,
    /// Booked services. Single-service bookings still use the array form.
    pub services: Vec<PayloadService>,
    /// Sum of service prices, as a string.
    pub total_price: String,
    /// Sum of service durations in minutes.
    pub total_duration_minutes: u32,
    /// Appointment start, ISO-8601 with timezone.
    pub appointment_start: String,
    /// Appointment end (start plus total duration), ISO-8601 with timezone.
    pub appointment_end: String,
    /// Appointment status at emission time.
    pub status: String,
    /// Auxiliary routing metadata.
    pub metadata: PayloadMetadata,
}

/// Builds the payload for one lifecycle event.
///
/// Deterministic for fixed inputs: the caller supplies the emission instant,
/// so snapshots persisted to the delivery ledger reproduce byte-for-byte.
pub fn build_payload(
    appointment: &Appointment,
    customer: &Customer,
    salon: &Salon,
    stylist: &Stylist,
    service: &Service,
    event_type: EventType,
    is_first_time_customer: bool,
    emitted_at: DateTime<Utc>,
) -> WebhookPayload {
    let start = appointment.starts_at();
    let end = start + Duration::minutes(i64::from(service.duration_minutes));

    WebhookPayload {
        appointment_id: appointment.id.to_string(),
        event_type: event_type.as_str().to_string(),
        created_at: emitted_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        customer: PayloadCustomer {
            id: customer.id.to_string(),
            phone: mask_phone(&customer.phone),
            first_name: customer.first_name.clone(),
            last_name: customer.last_name.clone(),
        },
        salon: PayloadSalon {
            id: salon.id.to_string(),
            name: salon.name.clone(),
            address: salon.address.clone(),
        },
        stylist: PayloadStylist { id: stylist.id.to_string(), name: stylist.full_name() },
        services: vec![PayloadService {
            id: service.id.to_string(),
            name: service.name.clone(),
            price: service.price.to_string(),
            duration_minutes: service.duration_minutes,
        }],
        total_price: service.price.to_string(),
        total_duration_minutes: service.duration_minutes,
        appointment_start: start.to_rfc3339_opts(SecondsFormat::Secs, true),
        appointment_end: end.to_rfc3339_opts(SecondsFormat::Secs, true),
        status: appointment.status.to_string(),
        metadata: PayloadMetadata {
            is_first_time_customer,
            source: PAYLOAD_SOURCE.to_string(),
            persian_date: calendar::persian_date_string(appointment.date),
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};
    use slotwise_core::{
        AppointmentId, AppointmentStatus, CustomerId, SalonId, ServiceId, StylistId,
    };

    use super::*;

    #[test]
    fn masks_long_phone_numbers() {
        assert_eq!(mask_phone("09121234567"), "0912***4567");
        assert_eq!(mask_phone("09187654321"), "0918***4321");
    }

    #[test]
    fn short_inputs_pass_through() {
        assert_eq!(mask_phone(""), "");
        assert_eq!(mask_phone("123"), "123");
        assert_eq!(mask_phone("123456"), "123456");
    }

    fn payload_fixture() -> WebhookPayload {
        let now = Utc::now();
        let salon_id = SalonId::new();
        let appointment = Appointment {
            id: AppointmentId::new(),
            customer_id: CustomerId::new(),
            stylist_id: StylistId::new(),
            service_id: ServiceId::new(),
            date: NaiveDate::from_ymd_opt(2025, 12, 22).unwrap(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            status: AppointmentStatus::Pending,
            customer_notes: String::new(),
            admin_notes: String::new(),
            cancellation: None,
            event_created_sent: false,
            event_confirmed_sent: false,
            created_at: now,
            updated_at: now,
        };
        let customer = Customer {
            id: appointment.customer_id,
            first_name: "Ali".into(),
            last_name: "Mohammadi".into(),
            phone: "09121234567".into(),
            channel_id: None,
        };
        let salon = Salon {
            id: salon_id,
            name: "Test Salon".into(),
            address: "Valiasr St, Tehran".into(),
            auto_approve_appointments: false,
        };
        let stylist = Stylist {
            id: appointment.stylist_id,
            salon_id,
            first_name: "Reza".into(),
            last_name: "Ahmadi".into(),
        };
        let service = Service {
            id: appointment.service_id,
            salon_id,
            name: "Men's haircut".into(),
            price: 150_000,
            duration_minutes: 30,
        };

        build_payload(
            &appointment,
            &customer,
            &salon,
            &stylist,
            &service,
            EventType::Created,
            true,
            now,
        )
    }

    #[test]
    fn payload_has_the_exact_wire_keys() {
        let value = serde_json::to_value(payload_fixture()).unwrap();
        let object = value.as_object().unwrap();

        for key in [
            "appointment_id",
            "event_type",
            "created_at",
            "customer",
            "salon",
            "stylist",
            "services",
            "total_price",
            "total_duration_minutes",
            "appointment_start",
            "appointment_end",
            "status",
            "metadata",
        ] {
            assert!(object.contains_key(key), "missing payload key {key}");
        }

        let customer = object["customer"].as_object().unwrap();
        for key in ["id", "phone", "first_name", "last_name"] {
            assert!(customer.contains_key(key), "missing customer key {key}");
        }

        let metadata = object["metadata"].as_object().unwrap();
        for key in ["is_first_time_customer", "source", "persian_date"] {
            assert!(metadata.contains_key(key), "missing metadata key {key}");
        }
    }

    #[test]
    fn payload_values_follow_the_contract() {
        let payload = payload_fixture();

        assert_eq!(payload.event_type, "created");
        assert_eq!(payload.customer.phone, "0912***4567");
        assert_eq!(payload.total_price, "150000");
        assert_eq!(payload.total_duration_minutes, 30);
        assert_eq!(payload.services.len(), 1);
        assert_eq!(payload.services[0].price, "150000");
        assert_eq!(payload.metadata.persian_date, "1404/10/01");
        assert_eq!(payload.metadata.source, "online_booking");
        assert_eq!(payload.status, "pending");
    }

    #[test]
    fn appointment_window_spans_the_service_duration() {
        let payload = payload_fixture();
        assert_eq!(payload.appointment_start, "2025-12-22T14:00:00Z");
        assert_eq!(payload.appointment_end, "2025-12-22T14:30:00Z");
    }
}
