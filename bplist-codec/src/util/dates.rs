/*!
 Contains date conversion functions between Core Foundation absolute time and [`chrono`] dates.

 Binary property lists store dates as a 64-bit float counting seconds since `2001-01-01T00:00:00Z`.
*/

use chrono::{DateTime, TimeZone, Utc};

use crate::error::bplist::BinaryPlistError;

/// Seconds between the Unix epoch and the Core Foundation reference date, `2001-01-01T00:00:00Z`
pub const CF_ABSOLUTE_TIME_OFFSET: i64 = 978_307_200;

/// Decoded dates are rounded to this many sub-second units
const MICROS_PER_SECOND: f64 = 1_000_000.;

/// Get the Core Foundation reference date
pub fn reference_date() -> DateTime<Utc> {
    Utc.timestamp_opt(CF_ABSOLUTE_TIME_OFFSET, 0)
        .single()
        .unwrap_or_default()
}

/// Convert seconds since the reference date into a date, rounded to the nearest microsecond
pub fn from_absolute_time(seconds: f64) -> Result<DateTime<Utc>, BinaryPlistError> {
    if !seconds.is_finite() {
        return Err(BinaryPlistError::InvalidDate(seconds));
    }

    let mut whole = seconds.floor();
    let mut micros = ((seconds - whole) * MICROS_PER_SECOND).round();
    if micros >= MICROS_PER_SECOND {
        whole += 1.;
        micros = 0.;
    }

    // Outside of this range the addition below cannot be trusted
    if whole.abs() > (i64::MAX / 2) as f64 {
        return Err(BinaryPlistError::InvalidDate(seconds));
    }

    DateTime::from_timestamp(
        whole as i64 + CF_ABSOLUTE_TIME_OFFSET,
        micros as u32 * 1_000,
    )
    .ok_or(BinaryPlistError::InvalidDate(seconds))
}

/// Convert a date into seconds since the reference date
pub fn to_absolute_time(date: &DateTime<Utc>) -> f64 {
    (date.timestamp() - CF_ABSOLUTE_TIME_OFFSET) as f64
        + date.timestamp_subsec_nanos() as f64 / 1_000_000_000.
}
