//! Daily timer for the scheduled ingestion job.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// `hour:00` on `date` in `zone`. Ambiguous times take the earlier instant;
/// times skipped by a DST jump move forward one hour.
fn local_run_time(zone: &Tz, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
    let at: NaiveDateTime = date.and_time(NaiveTime::from_hms_opt(hour.min(23), 0, 0)?);
    zone.from_local_datetime(&at)
        .earliest()
        .or_else(|| zone.from_local_datetime(&(at + Duration::hours(1))).earliest())
}

/// Next `hour:00` in `zone` strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, hour: u32, zone: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&zone).date_naive();

    (0..=2)
        .filter_map(|days| local_run_time(&zone, today + Duration::days(days), hour))
        .map(|t| t.with_timezone(&Utc))
        .find(|t| *t > now)
        .unwrap_or(now + Duration::days(1))
}

/// How long to sleep until the next run.
pub fn until_next_run(now: DateTime<Utc>, hour: u32, zone: Tz) -> std::time::Duration {
    (next_daily_run(now, hour, zone) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
