//! Device-local calendar helpers.
//!
//! Every function takes the IANA timezone explicitly. Nothing here reads the
//! host's local time zone.

use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::cmp::Ordering;

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|e| AppError::Config(format!("unknown timezone '{}': {}", name, e)))
}

/// Calendar date of `instant` as seen on a wall clock in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First instant of `date` in `tz`.
///
/// An ambiguous midnight resolves to the earlier instant. Zones that skip
/// midnight on a DST change start the day at the first wall time that exists.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    let mut candidate = date.and_time(NaiveTime::MIN);
    for _ in 0..=(24 * 4) {
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return Ok(dt.with_timezone(&Utc));
        }
        candidate += Duration::minutes(15);
    }
    Err(AppError::Time(format!(
        "no valid local time on {} in {}",
        date, tz
    )))
}

/// Half-open UTC interval `[start, end)` covering `date` in `tz`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let next = date
        .succ_opt()
        .ok_or_else(|| AppError::Time(format!("date out of range: {}", date)))?;
    Ok((local_midnight(date, tz)?, local_midnight(next, tz)?))
}

/// Whether `date` may be written as a final summary at `now`.
///
/// Past dates are always final. Device-local today becomes final once the
/// local time of day reaches `cutoff`. Future dates never are.
pub fn is_finalized(date: NaiveDate, now: DateTime<Utc>, tz: Tz, cutoff: NaiveTime) -> bool {
    let local_now = now.with_timezone(&tz);
    match date.cmp(&local_now.date_naive()) {
        Ordering::Less => true,
        Ordering::Equal => local_now.time() >= cutoff,
        Ordering::Greater => false,
    }
}

/// `YYYY-MM` bucket label of an already device-local date.
pub fn month_key(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
