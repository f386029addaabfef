//! Time utilities: timezone-aware local wall-clock times for day plans.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

fn localize(ndt: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>> {
    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {ndt} {tz}"))?;
    Ok(local_dt.with_timezone(&Utc))
}

/// Resolve a wall-clock "HH:MM" on `day` in `tz` to UTC.
pub fn local_time_to_utc(day: NaiveDate, hhmm: &str, tz: &str) -> Result<DateTime<Utc>> {
    let tz = parse_tz(tz)?;
    let time = NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local time '{hhmm}': {e}"))?;
    localize(day.and_time(time), tz)
}

/// Local calendar day of a UTC instant in `tz`.
pub fn local_day(now: DateTime<Utc>, tz: &str) -> Result<NaiveDate> {
    let tz = parse_tz(tz)?;
    Ok(now.with_timezone(&tz).date_naive())
}
