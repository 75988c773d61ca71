//! Property tests for pure domain primitives.

use chrono::NaiveDate;
use proptest::prelude::*;
use slotwise_core::{calendar, idempotency_key, AppointmentId, EventType};
use uuid::Uuid;

proptest! {
    #[test]
    fn idempotency_keys_are_stable(bytes in any::<[u8; 16]>()) {
        let id = AppointmentId(Uuid::from_bytes(bytes));
        prop_assert_eq!(
            idempotency_key(id, EventType::Created),
            idempotency_key(id, EventType::Created)
        );
    }

    #[test]
    fn idempotency_keys_never_collide_across_event_types(bytes in any::<[u8; 16]>()) {
        let id = AppointmentId(Uuid::from_bytes(bytes));
        prop_assert_ne!(
            idempotency_key(id, EventType::Created),
            idempotency_key(id, EventType::Confirmed)
        );
    }

    #[test]
    fn distinct_appointments_get_distinct_keys(a in any::<[u8; 16]>(), b in any::<[u8; 16]>()) {
        if a != b {
            prop_assert_ne!(
                idempotency_key(AppointmentId(Uuid::from_bytes(a)), EventType::Created),
                idempotency_key(AppointmentId(Uuid::from_bytes(b)), EventType::Created)
            );
        }
    }

    #[test]
    fn persian_dates_are_well_formed(days in 0i64..20000) {
        let date = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + chrono::Duration::days(days);
        let persian = calendar::persian_date_string(date);

        let parts: Vec<&str> = persian.split('/').collect();
        prop_assert_eq!(parts.len(), 3);

        let month: u32 = parts[1].parse().unwrap();
        let day: u32 = parts[2].parse().unwrap();
        prop_assert!((1..=12).contains(&month));
        prop_assert!((1..=31).contains(&day));
    }

    #[test]
    fn consecutive_days_never_share_a_persian_date(days in 0i64..20000) {
        let base = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let today = base + chrono::Duration::days(days);
        let tomorrow = base + chrono::Duration::days(days + 1);

        prop_assert_ne!(
            calendar::persian_date_string(today),
            calendar::persian_date_string(tomorrow)
        );
    }
}
