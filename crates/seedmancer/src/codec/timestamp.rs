//! Timestamp text formats.
//!
//! Exported instants are always written in UTC with microsecond precision and
//! a zone suffix, e.g. `2024-03-01 12:30:05.250000 +0000 UTC`, so every row
//! file has one fixed-width layout regardless of the source engine.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

const EXPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f +0000 UTC";
const ZONED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";
const OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%#z";
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of parsing time text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTime {
    Instant(DateTime<FixedOffset>),
    Date(NaiveDate),
}

/// Render an instant in the export format.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&Utc).format(EXPORT_FORMAT).to_string()
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse time text, trying the zone-suffixed export format first, then
/// general timestamp formats, then a bare date. Offset-less timestamps are
/// taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<ParsedTime> {
    let text = text.trim();

    if text.contains("UTC") {
        if let Some(ts) = parse_zone_suffixed(text) {
            return Some(ParsedTime::Instant(ts));
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ParsedTime::Instant(ts));
    }
    if let Ok(ts) = DateTime::parse_from_str(text, OFFSET_FORMAT) {
        return Some(ParsedTime::Instant(ts));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(ParsedTime::Instant(naive.and_utc().fixed_offset()));
        }
    }

    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .map(ParsedTime::Date)
}

/// `<datetime> <offset> <zone name>`; the zone name is informational only.
fn parse_zone_suffixed(text: &str) -> Option<DateTime<FixedOffset>> {
    let (head, zone) = text.rsplit_once(' ')?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    DateTime::parse_from_str(head, ZONED_FORMAT).ok()
}

/// Midnight UTC on `date`.
pub fn date_to_instant(date: NaiveDate) -> DateTime<FixedOffset> {
    date.and_time(chrono::NaiveTime::MIN).and_utc().fixed_offset()
}
