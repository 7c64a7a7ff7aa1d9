//! Timestamps are stored as RFC 3339 UTC strings with second precision so
//! that lexical comparison in SQL matches chronological order.

use anyhow::{Result, anyhow};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn from_db(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone marker.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|e| anyhow!("Bad timestamp '{}': {}", raw, e))
}

pub fn date_to_db(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn date_from_db(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| anyhow!("Bad date '{}': {}", raw, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn stored_timestamps_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 9, 23, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 10, 1, 0, 0).unwrap();
        assert!(to_db(early) < to_db(late));
        assert_eq!(from_db(&to_db(late)).unwrap(), late);
    }

    #[test]
    fn accepts_sqlite_default_format() {
        let parsed = from_db("2026-03-04 05:06:07").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap());
    }
}
