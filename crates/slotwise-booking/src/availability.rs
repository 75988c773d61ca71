//! Open-slot derivation from working hours minus active bookings.

use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use slotwise_core::{
    error::Result,
    storage::{Directory, SlotLedger},
    StylistId,
};

/// Default width of a bookable slot.
pub const DEFAULT_SLOT_MINUTES: u32 = 30;

/// The open slots for one stylist and date, plus the window they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Availability {
    /// Open starting times, ascending.
    pub slots: Vec<NaiveTime>,
    /// The working window consulted, when one was configured.
    pub working_hours: Option<(NaiveTime, NaiveTime)>,
}

/// Generates fixed-width slot starting times across a working window.
///
/// Slots start at `start` and step by `slot_minutes`; a slot whose starting
/// time reaches `end` is excluded. Deterministic for identical inputs.
pub fn generate_time_slots(start: NaiveTime, end: NaiveTime, slot_minutes: u32) -> Vec<NaiveTime> {
    let mut slots = Vec::new();
    if slot_minutes == 0 {
        return slots;
    }

    let step = Duration::minutes(i64::from(slot_minutes));
    let mut current = start;
    while current < end {
        slots.push(current);
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 {
            break;
        }
        current = next;
    }
    slots
}

/// Derives open time slots for a stylist on a date.
pub struct AvailabilityCalculator {
    directory: Arc<dyn Directory>,
    slot_ledger: Arc<dyn SlotLedger>,
    slot_minutes: u32,
}

impl AvailabilityCalculator {
    /// Creates a calculator with the default slot width.
    pub fn new(directory: Arc<dyn Directory>, slot_ledger: Arc<dyn SlotLedger>) -> Self {
        Self::with_slot_minutes(directory, slot_ledger, DEFAULT_SLOT_MINUTES)
    }

    /// Creates a calculator with a custom slot width.
    pub fn with_slot_minutes(
        directory: Arc<dyn Directory>,
        slot_ledger: Arc<dyn SlotLedger>,
        slot_minutes: u32,
    ) -> Self {
        Self { directory, slot_ledger, slot_minutes }
    }

    /// Computes the open slots for `stylist_id` on `date`.
    ///
    /// No working hours configured for the weekday means no availability;
    /// otherwise the window is partitioned into fixed-width slots and times
    /// held by active appointments are subtracted. Output is ascending and
    /// deterministic for identical inputs.
    pub async fn available_slots(
        &self,
        stylist_id: StylistId,
        date: NaiveDate,
    ) -> Result<Availability> {
        let Some(hours) = self.directory.working_hours(stylist_id, date.weekday()).await? else {
            return Ok(Availability { slots: Vec::new(), working_hours: None });
        };

        let all_slots = generate_time_slots(hours.start, hours.end, self.slot_minutes);
        let booked = self.slot_ledger.booked_times(stylist_id, date).await?;

        let slots =
            all_slots.into_iter().filter(|slot| !booked.contains(slot)).collect::<Vec<_>>();

        Ok(Availability { slots, working_hours: Some((hours.start, hours.end)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn slots_cover_window_exclusive_of_end() {
        let slots = generate_time_slots(t(9, 0), t(11, 0), 30);
        assert_eq!(slots, vec![t(9, 0), t(9, 30), t(10, 0), t(10, 30)]);
    }

    #[test]
    fn empty_window_has_no_slots() {
        assert!(generate_time_slots(t(9, 0), t(9, 0), 30).is_empty());
        assert!(generate_time_slots(t(17, 0), t(9, 0), 30).is_empty());
    }

    #[test]
    fn zero_width_slots_rejected() {
        assert!(generate_time_slots(t(9, 0), t(17, 0), 0).is_empty());
    }

    #[test]
    fn slot_generation_is_deterministic() {
        let a = generate_time_slots(t(9, 0), t(17, 0), 30);
        let b = generate_time_slots(t(9, 0), t(17, 0), 30);
        assert_eq!(a, b);
    }
}
