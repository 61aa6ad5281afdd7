//! FILENAME: timebin/src/time.rs
//! PURPOSE: Timestamp normalization and inclusive time ranges.
//! CONTEXT: Every timestamp entering the binning layer is a `DateTime<Utc>`.
//! Text values from tabular sources are parsed here so that the pivot layer
//! never has to care about offsets or formats.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Smallest bin width the automatic binner will ever pick.
pub const ONE_MILLISECOND: TimeDelta = TimeDelta::milliseconds(1);

/// Naive formats accepted after RFC 3339 fails. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

// ============================================================================
// PARSING
// ============================================================================

/// Parses a textual timestamp and normalizes it to UTC.
///
/// Accepted forms, tried in order:
/// - RFC 3339 with any offset (`2024-01-01T02:00:00+02:00`)
/// - naive date-time with a space or `T` separator, optional fraction
/// - a bare date (`2024-01-01`), taken as midnight UTC
///
/// Returns `None` for anything else; callers treat that as "no timestamp".
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ============================================================================
// TIME RANGE
// ============================================================================

/// A closed interval `[start, end]` of instants.
///
/// Used for the min/max extent of a node's rows and for externally reported
/// ranges. Unlike [`crate::BinnedRange`] both ends are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a range from two instants in either order.
    pub fn new(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            TimeRange { start: a, end: b }
        } else {
            TimeRange { start: b, end: a }
        }
    }

    /// A zero-length range covering a single instant.
    pub fn point(at: DateTime<Utc>) -> Self {
        TimeRange { start: at, end: at }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(self, other: TimeRange) -> Self {
        TimeRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Grows the range so it covers `at`.
    pub fn include(&mut self, at: DateTime<Utc>) {
        if at < self.start {
            self.start = at;
        }
        if at > self.end {
            self.end = at;
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end.signed_duration_since(self.start)
    }
}

// ============================================================================
// ARITHMETIC HELPERS
// ============================================================================

/// Floors a millisecond timestamp down to a multiple of `width_ms` (> 0).
/// Works for instants before the epoch as well. `None` when the floored value
/// does not fit in an `i64`.
pub(crate) fn floor_millis(ms: i64, width_ms: i64) -> Option<i64> {
    ms.div_euclid(width_ms).checked_mul(width_ms)
}

/// Ceiling division for a non-negative numerator and a positive divisor.
pub(crate) fn ceil_div(numerator: i64, divisor: i64) -> i64 {
    (numerator + divisor - 1) / divisor
}

/// Exact length of a delta in nanoseconds. `i128` so that spans covering the
/// whole chrono domain never overflow.
pub(crate) fn total_nanos(delta: TimeDelta) -> i128 {
    delta.num_seconds() as i128 * 1_000_000_000 + delta.subsec_nanos() as i128
}
