//! Value normalization shared by the aggregator and the conflict detector.
//!
//! Every raw activity row passes through [`normalize_record`] exactly once
//! before grouping. None of these helpers fail: bad data becomes a zero
//! contribution or a default label.

use crate::models::{ActivityRecord, RecordId, TimeBucket};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Label used when a record has a blank or missing type.
pub const UNTYPED: &str = "untyped";

/// Label used when a record has a blank or missing region.
pub const UNSPECIFIED: &str = "unspecified";

/// The only status eligible for aggregation.
pub const ACTIVE_STATUS: &str = "active";

/// Naive layouts accepted after RFC 3339 fails; all read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// An activity record after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub id: RecordId,
    pub activity_type: String,
    pub region: String,
    pub quantity: u64,
    pub occurred_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Normalize a raw record: default labels, coerce quantity, flag status.
pub fn normalize_record(record: &ActivityRecord) -> NormalizedRecord {
    NormalizedRecord {
        id: record.id.clone(),
        activity_type: normalize_label(record.activity_type.as_deref(), UNTYPED),
        region: normalize_label(record.region.as_deref(), UNSPECIFIED),
        quantity: normalize_quantity(record.quantity.as_ref()),
        occurred_at: record.occurred_at,
        active: is_active(record.status.as_deref()),
    }
}

/// Trim a label, falling back to `fallback` when blank or absent.
///
/// Case is preserved.
pub fn normalize_label(raw: Option<&str>, fallback: &str) -> String {
    match raw.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => fallback.to_string(),
    }
}

/// Coerce a raw quantity to a non-negative integer.
///
/// Integers are kept, floats truncate toward zero, strings use their leading
/// decimal digits. Negatives and anything unparseable become 0.
pub fn normalize_quantity(raw: Option<&Value>) -> u64 {
    match raw {
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_u64() {
                v
            } else if n.is_i64() {
                0
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f > 0.0)
                    .map_or(0, |f| f.trunc() as u64)
            }
        }
        Some(Value::String(s)) => parse_leading_integer(s),
        _ => 0,
    }
}

/// Parse the leading decimal integer of `s`, ignoring trailing garbage.
///
/// `"12abc"` is 12, `"  7"` is 7, `"abc"` and `"-3"` are 0.
pub fn parse_leading_integer(s: &str) -> u64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, b| {
            acc.saturating_mul(10).saturating_add(u64::from(b - b'0'))
        });

    if negative {
        0
    } else {
        value
    }
}

/// Whether a status tag makes a record eligible for aggregation.
pub fn is_active(status: Option<&str>) -> bool {
    status.map(str::trim) == Some(ACTIVE_STATUS)
}

/// Truncate an instant to the start of its bucket, in UTC.
pub fn truncate_to_bucket(instant: DateTime<Utc>, bucket: TimeBucket) -> DateTime<Utc> {
    let date = instant.date_naive();
    let start = match bucket {
        TimeBucket::Day => date,
        TimeBucket::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        TimeBucket::Month => date.with_day(1).unwrap_or(date),
        TimeBucket::Year => date.with_ordinal(1).unwrap_or(date),
    };
    start.and_time(NaiveTime::MIN).and_utc()
}

/// Parse a timestamp as exported by the store.
///
/// Accepts RFC 3339, Postgres-style `2024-01-01 10:00:00+00`, naive
/// date-times (read as UTC), and bare dates (midnight UTC).
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Serde adapter for required instants.
pub fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).ok_or_else(|| de::Error::custom(format!("unrecognized timestamp: {}", raw)))
}

/// Serde adapter for free-form labels on raw records.
///
/// Strings pass through, numbers and booleans become their text form, and
/// anything else (null, arrays, objects) is absent. Never fails.
pub fn deserialize_lenient_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Serde adapter for record timestamps that tolerates garbage.
///
/// Anything that is not a parseable timestamp string is absent.
pub fn deserialize_lenient_instant<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(raw) if raw.trim().is_empty() => None,
        Value::String(raw) => {
            let parsed = parse_instant(&raw);
            if parsed.is_none() {
                warn!("Unparseable occurredAt {:?}; record is treated as undated", raw);
            }
            parsed
        }
        other => {
            warn!("Non-string occurredAt {}; record is treated as undated", other);
            None
        }
    })
}

/// Serde adapter for optional instants. Null and blank strings are absent.
pub fn deserialize_optional_instant<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_instant(&raw)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp: {}", raw))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(Some("NPS"), UNTYPED), "NPS");
        assert_eq!(normalize_label(Some("  Sul "), UNSPECIFIED), "Sul");
        assert_eq!(normalize_label(Some("   "), UNTYPED), "untyped");
        assert_eq!(normalize_label(None, UNSPECIFIED), "unspecified");
    }

    #[test]
    fn test_normalize_quantity_numbers() {
        assert_eq!(normalize_quantity(Some(&json!(10))), 10);
        assert_eq!(normalize_quantity(Some(&json!(-4))), 0);
        assert_eq!(normalize_quantity(Some(&json!(3.9))), 3);
        assert_eq!(normalize_quantity(Some(&json!(-3.9))), 0);
        assert_eq!(normalize_quantity(Some(&json!(0))), 0);
    }

    #[test]
    fn test_normalize_quantity_never_fails() {
        assert_eq!(normalize_quantity(None), 0);
        assert_eq!(normalize_quantity(Some(&Value::Null)), 0);
        assert_eq!(normalize_quantity(Some(&json!(true))), 0);
        assert_eq!(normalize_quantity(Some(&json!([1, 2]))), 0);
        assert_eq!(normalize_quantity(Some(&json!({"n": 1}))), 0);
    }

    #[test]
    fn test_parse_leading_integer() {
        assert_eq!(parse_leading_integer("5"), 5);
        assert_eq!(parse_leading_integer("  7"), 7);
        assert_eq!(parse_leading_integer("12abc"), 12);
        assert_eq!(parse_leading_integer("+8"), 8);
        assert_eq!(parse_leading_integer("-3"), 0);
        assert_eq!(parse_leading_integer("abc"), 0);
        assert_eq!(parse_leading_integer(""), 0);
        assert_eq!(parse_leading_integer("99999999999999999999999"), u64::MAX);
    }

    #[test]
    fn test_is_active() {
        assert!(is_active(Some("active")));
        assert!(is_active(Some(" active ")));
        assert!(!is_active(Some("inactive")));
        assert!(!is_active(Some("Active")));
        assert!(!is_active(None));
    }

    #[test]
    fn test_truncate_to_bucket() {
        // Wednesday
        let instant = utc(2024, 5, 15, 17, 42);
        assert_eq!(truncate_to_bucket(instant, TimeBucket::Day), utc(2024, 5, 15, 0, 0));
        assert_eq!(truncate_to_bucket(instant, TimeBucket::Week), utc(2024, 5, 13, 0, 0));
        assert_eq!(truncate_to_bucket(instant, TimeBucket::Month), utc(2024, 5, 1, 0, 0));
        assert_eq!(truncate_to_bucket(instant, TimeBucket::Year), utc(2024, 1, 1, 0, 0));
    }

    #[test]
    fn test_week_bucket_crosses_year_boundary() {
        // 2025-01-01 is a Wednesday; its week starts Monday 2024-12-30.
        let instant = utc(2025, 1, 1, 9, 0);
        assert_eq!(truncate_to_bucket(instant, TimeBucket::Week), utc(2024, 12, 30, 0, 0));
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = utc(2024, 1, 1, 10, 0);
        assert_eq!(parse_instant("2024-01-01T10:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-01T10:00:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-01 10:00:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_instant("2024-01-01T07:00:00-03:00"), Some(expected));
        assert_eq!(parse_instant("2024-01-01 10:00:00+00"), Some(expected));
        assert_eq!(parse_instant("2024-01-01"), Some(utc(2024, 1, 1, 0, 0)));
        assert_eq!(parse_instant("yesterday"), None);
    }

    #[derive(Debug, Deserialize)]
    struct LenientFields {
        #[serde(default, deserialize_with = "deserialize_lenient_label")]
        label: Option<String>,
        #[serde(default, deserialize_with = "deserialize_lenient_instant")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn test_lenient_label_accepts_any_json() {
        let parse = |raw: &str| serde_json::from_str::<LenientFields>(raw).unwrap().label;
        assert_eq!(parse(r#"{"label": "sul"}"#), Some("sul".to_string()));
        assert_eq!(parse(r#"{"label": 3}"#), Some("3".to_string()));
        assert_eq!(parse(r#"{"label": true}"#), Some("true".to_string()));
        assert_eq!(parse(r#"{"label": null}"#), None);
        assert_eq!(parse(r#"{"label": ["a"]}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn test_lenient_instant_accepts_any_json() {
        let parse = |raw: &str| serde_json::from_str::<LenientFields>(raw).unwrap().at;
        assert_eq!(parse(r#"{"at": "2024-01-01T10:00"}"#), Some(utc(2024, 1, 1, 10, 0)));
        assert_eq!(parse(r#"{"at": "not a date"}"#), None);
        assert_eq!(parse(r#"{"at": 1704103200}"#), None);
        assert_eq!(parse(r#"{"at": null}"#), None);
        assert_eq!(parse(r#"{}"#), None);
    }

    #[test]
    fn test_normalize_record() {
        let record = ActivityRecord {
            id: RecordId::Number(1),
            activity_type: Some(" ".to_string()),
            region: None,
            quantity: Some(json!("4 families")),
            occurred_at: Some(utc(2024, 2, 2, 12, 0)),
            status: Some("active".to_string()),
        };
        let normalized = normalize_record(&record);
        assert_eq!(normalized.activity_type, UNTYPED);
        assert_eq!(normalized.region, UNSPECIFIED);
        assert_eq!(normalized.quantity, 4);
        assert!(normalized.active);
    }
}
