//! Due date extraction and reduction.

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::config::NearestDatePolicy;
use crate::models::RecordResource;

/// Naive date-time layouts accepted in addition to RFC 3339.
const NAIVE_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a due date string into an instant.
///
/// Accepts RFC 3339 date-times, naive date-times (taken as UTC) and plain
/// `YYYY-MM-DD` dates (midnight UTC).
#[must_use]
pub fn parse_due_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Collect the non-blank string values of `field`, in record order.
#[must_use]
pub fn extract_dates(records: &[RecordResource], field: &str) -> Vec<String> {
    records
        .iter()
        .filter_map(|record| record.attribute_str(field))
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Reduce a date set to a single date under `policy`.
///
/// The returned string is the original element, not a re-serialization.
/// Elements that cannot be parsed are skipped.
#[must_use]
pub fn reduce(policy: NearestDatePolicy, dates: &[String], now: DateTime<Utc>) -> Option<String> {
    let parsed = parse_all(dates);
    let picked = match policy {
        NearestDatePolicy::Earliest => earliest(&parsed),
        NearestDatePolicy::NearestToNow => nearest_to_now(&parsed, now),
    };
    picked.map(|(_, raw)| raw.to_string())
}

fn parse_all(dates: &[String]) -> Vec<(DateTime<Utc>, &str)> {
    dates
        .iter()
        .filter_map(|raw| match parse_due_date(raw) {
            Some(instant) => Some((instant, raw.as_str())),
            None => {
                warn!(value = %raw, "Skipping unparseable due date");
                None
            }
        })
        .collect()
}

/// Earliest element; the first one wins on ties.
fn earliest<'a>(dates: &[(DateTime<Utc>, &'a str)]) -> Option<(DateTime<Utc>, &'a str)> {
    dates.iter().copied().min_by_key(|(instant, _)| *instant)
}

/// Latest element; the first one wins on ties.
fn latest<'a>(dates: &[(DateTime<Utc>, &'a str)]) -> Option<(DateTime<Utc>, &'a str)> {
    dates.iter().copied().fold(None, |best, candidate| match best {
        Some(current) if current.0 >= candidate.0 => Some(current),
        _ => Some(candidate),
    })
}

/// Soonest strictly-future element, else most recent element at or before `now`.
fn nearest_to_now<'a>(
    dates: &[(DateTime<Utc>, &'a str)],
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, &'a str)> {
    let (future, past): (Vec<_>, Vec<_>) = dates
        .iter()
        .copied()
        .partition(|(instant, _)| *instant > now);
    earliest(&future).or_else(|| latest(&past))
}

/// Add exactly one calendar day and serialize with a `+00:00` offset.
///
/// `2024-01-31T00:00:00.000Z` becomes `2024-02-01T00:00:00+00:00`.
#[must_use]
pub fn add_one_day(value: &str) -> Option<String> {
    parse_due_date(value)?
        .checked_add_days(Days::new(1))
        .map(|shifted| shifted.to_rfc3339_opts(SecondsFormat::Secs, false))
}
