//! Row-to-response helpers. Corrupt stored values are logged and replaced
//! with defaults rather than failing the whole response.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use slimquest_db::time;

pub(crate) fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn timestamp(raw: &str) -> DateTime<Utc> {
    time::from_db(raw).unwrap_or_else(|e| {
        warn!("{}", e);
        DateTime::default()
    })
}

pub(crate) fn opt_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.map(timestamp)
}

pub(crate) fn opt_date(raw: Option<&str>) -> Option<NaiveDate> {
    raw.and_then(|d| {
        time::date_from_db(d)
            .map_err(|e| warn!("{}", e))
            .ok()
    })
}

/// Clamp a caller-supplied page size.
pub(crate) fn page_limit(limit: u32) -> u32 {
    limit.clamp(1, 200)
}

pub(crate) fn parse_enum<T: std::str::FromStr>(raw: &str, fallback: T) -> T
where
    T::Err: std::fmt::Display,
{
    raw.parse().unwrap_or_else(|e| {
        warn!("{}", e);
        fallback
    })
}
