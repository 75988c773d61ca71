//! Persian (Jalali) calendar conversion.
//!
//! The booking engine stores Gregorian dates; customer-facing surfaces and
//! webhook metadata display Persian dates. This is a self-contained pure
//! mapping with no policy attached.

use chrono::{Datelike, NaiveDate};

/// Days before the start of each Gregorian month (non-leap basis).
const G_DAYS_IN_MONTH: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

/// Converts a Gregorian date to Persian `(year, month, day)`.
pub fn to_persian(date: NaiveDate) -> (i32, u32, u32) {
    let gy = i64::from(date.year());
    let gm = i64::from(date.month());
    let gd = i64::from(date.day());

    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + (365 * gy) + ((gy2 + 3) / 4) - ((gy2 + 99) / 100)
        + ((gy2 + 399) / 400)
        + gd
        + G_DAYS_IN_MONTH[(gm - 1) as usize];

    let mut jy = -1595 + 33 * (days / 12_053);
    days %= 12_053;

    jy += 4 * (days / 1461);
    days %= 1461;

    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };

    (jy as i32, jm as u32, jd as u32)
}

/// Formats a Gregorian date as a Persian `YYYY/MM/DD` string.
pub fn persian_date_string(date: NaiveDate) -> String {
    let (jy, jm, jd) = to_persian(date);
    format!("{jy}/{jm:02}/{jd:02}")
}
