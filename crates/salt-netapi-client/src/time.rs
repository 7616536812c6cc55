//! Timestamp formats used by the master.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Format of job `StartTime` values, e.g. `2020, Feb 02 21:02:31.414902`.
const JOB_TIME_FORMAT: &str = "%Y, %b %d %H:%M:%S%.f";

/// Convert fractional Unix seconds to a UTC timestamp.
#[must_use]
pub fn from_unix_seconds(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (secs, nanos) = {
        let secs = value.floor();
        (secs as i64, ((value - secs) * 1e9) as u32)
    };
    DateTime::from_timestamp(secs, nanos.min(999_999_999))
}

/// Parse a job `StartTime` value. Masters report these in UTC.
#[must_use]
pub fn parse_job_time(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), JOB_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn unix_seconds<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<f64>::deserialize(deserializer)?;
    Ok(raw.and_then(from_unix_seconds))
}
