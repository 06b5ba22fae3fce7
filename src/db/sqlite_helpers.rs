//! SQLite helper utilities for type conversion
//!
//! SQLite has no native UUID, boolean or timestamp types. Ids are stored as
//! TEXT, booleans as 0/1 INTEGER and timestamps as fixed-width RFC 3339 TEXT
//! so that lexical order matches chronological order.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use uuid::Uuid;

// ============================================================================
// UUID Helpers
// ============================================================================

/// Fresh primary key value
#[inline]
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Timestamp Helpers (stored as RFC 3339 TEXT in SQLite)
// ============================================================================

/// Current UTC time for default and updated-at stamps
#[inline]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a DateTime to its stored form: `2024-01-02T03:04:05.000000000Z`
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a stored timestamp
///
/// Accepts any RFC 3339 string and SQLite's own `datetime()` output
/// (`YYYY-MM-DD HH:MM:SS`), which raw queries may produce.
pub fn str_to_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| ndt.and_utc())
                .ok()
        })
}

// ============================================================================
// Boolean Helpers (SQLite uses 0/1 integers)
// ============================================================================

/// Convert bool to SQLite integer (0 or 1)
#[inline]
pub fn bool_to_int(b: bool) -> i64 {
    if b { 1 } else { 0 }
}

/// Convert SQLite integer to bool
#[inline]
pub fn int_to_bool(i: i64) -> bool {
    i != 0
}
