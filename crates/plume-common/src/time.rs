//! Acquisition date windows.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, PlumeResult};

/// A half-open acquisition window `[start, end)`.
///
/// Retrievals look for a single overpass, so the usual window is one calendar
/// day: the acquisition date and the following day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Create a window, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> PlumeResult<Self> {
        if end <= start {
            return Err(PlumeError::invalid_input(
                "date_window",
                format!("end {} is not after start {}", end, start),
            ));
        }
        Ok(Self { start, end })
    }

    /// The window from midnight UTC on `date` to midnight on the following day.
    pub fn day_of(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        Self {
            start,
            end: start + Duration::days(1),
        }
    }

    /// Parse a "YYYY-MM-DD" date into its one-day window.
    pub fn parse_day(s: &str) -> PlumeResult<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self::day_of)
            .map_err(|e| PlumeError::invalid_input("date", format!("'{}': {}", s, e)))
    }

    /// Check whether an acquisition time falls inside the window.
    pub fn contains(&self, t: &DateTime<Utc>) -> bool {
        *t >= self.start && *t < self.end
    }

    /// Key fragment for caches, e.g. "20191120T000000_20191121T000000".
    pub fn cache_key(&self) -> String {
        format!(
            "{}_{}",
            self.start.format("%Y%m%dT%H%M%S"),
            self.end.format("%Y%m%dT%H%M%S")
        )
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Parse an acquisition timestamp: RFC 3339, or naive "YYYY-MM-DDTHH:MM:SS" taken as UTC.
pub fn parse_timestamp(s: &str) -> PlumeResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(PlumeError::invalid_input(
        "timestamp",
        format!("'{}' is not an ISO 8601 timestamp", s),
    ))
}
