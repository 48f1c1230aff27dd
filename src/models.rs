//! Data models for the activity engine.
//!
//! Raw input rows (`ActivityRecord`, `CalendarEvent`) arrive exactly as the
//! data-access layer fetched them. Derived views (`AggregateBucket`,
//! `ConflictPair`, `ActivitySummary`) are recomputed on every call.

use crate::analysis::normalize::{
    deserialize_instant, deserialize_lenient_instant, deserialize_lenient_label,
    deserialize_optional_instant,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a record or event.
///
/// Integers in the `i64` range order numerically, text orders lexically, and
/// every number sorts before every text id. Numeric ids outside `i64`
/// (fractions, values above `i64::MAX`) are kept as their decimal text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged, from = "RawRecordId")]
pub enum RecordId {
    Number(i64),
    Text(String),
}

/// Wire shapes accepted for an id before folding into [`RecordId`].
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRecordId {
    Integer(i64),
    Number(serde_json::Number),
    Text(String),
}

impl From<RawRecordId> for RecordId {
    fn from(raw: RawRecordId) -> Self {
        match raw {
            RawRecordId::Integer(n) => RecordId::Number(n),
            RawRecordId::Number(n) => RecordId::Text(n.to_string()),
            RawRecordId::Text(s) => RecordId::Text(s),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Number(n) => write!(f, "{}", n),
            RecordId::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Number(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/// A time-stamped regional activity, unnormalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Unique identifier.
    pub id: RecordId,
    /// Category tag such as "NPS" or "diagnostics_performed".
    #[serde(rename = "type", default, deserialize_with = "deserialize_lenient_label")]
    pub activity_type: Option<String>,
    /// Region code or name; numeric codes arrive as their decimal text.
    #[serde(default, deserialize_with = "deserialize_lenient_label")]
    pub region: Option<String>,
    /// Quantity as stored: number, numeric string, or garbage.
    #[serde(default)]
    pub quantity: Option<Value>,
    /// When the activity occurred; `None` when missing or unparseable.
    #[serde(default, deserialize_with = "deserialize_lenient_instant")]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Lifecycle tag; only "active" records are aggregated.
    #[serde(default, deserialize_with = "deserialize_lenient_label")]
    pub status: Option<String>,
}

/// A scheduled event scoped to a region or responsible party.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    /// Unique identifier.
    pub id: RecordId,
    /// Conflict domain; events in different scopes never conflict.
    pub scope_key: String,
    /// Start instant.
    #[serde(deserialize_with = "deserialize_instant")]
    pub start: DateTime<Utc>,
    /// End instant; absent for point events.
    #[serde(
        default,
        deserialize_with = "deserialize_optional_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub end: Option<DateTime<Utc>>,
}

impl CalendarEvent {
    /// End used for overlap checks: a point event ends where it starts.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.start)
    }
}

/// Granularity used to truncate instants into time buckets (UTC).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    Day,
    /// ISO week starting Monday.
    Week,
    Month,
    Year,
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeBucket::Day => write!(f, "day"),
            TimeBucket::Week => write!(f, "week"),
            TimeBucket::Month => write!(f, "month"),
            TimeBucket::Year => write!(f, "year"),
        }
    }
}

/// Which dimensions make up the aggregation key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBy {
    #[serde(default)]
    pub by_type: bool,
    #[serde(default)]
    pub by_region: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_bucket: Option<TimeBucket>,
}

impl GroupBy {
    /// Group by type and region, no time bucketing.
    pub fn type_and_region() -> Self {
        Self {
            by_type: true,
            by_region: true,
            time_bucket: None,
        }
    }

    /// Adds time bucketing at the given granularity.
    pub fn with_bucket(mut self, bucket: TimeBucket) -> Self {
        self.time_bucket = Some(bucket);
        self
    }

    /// Human-readable list of the selected dimensions.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.by_type {
            parts.push("type".to_string());
        }
        if self.by_region {
            parts.push("region".to_string());
        }
        if let Some(bucket) = self.time_bucket {
            parts.push(bucket.to_string());
        }
        if parts.is_empty() {
            "all records".to_string()
        } else {
            parts.join(" + ")
        }
    }
}

/// A derived total for one grouping key.
///
/// Key components not selected by the `GroupBy` are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateBucket {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub activity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Start of the time bucket. When time bucketing is selected, `None`
    /// holds the records that carry no usable timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_bucket: Option<DateTime<Utc>>,
    /// Number of contributing records.
    pub count: usize,
    /// Sum of contributing quantities.
    pub total: u64,
}

/// Two distinct events in the same scope whose closed intervals overlap.
///
/// `first < second` always holds; events sharing an id are never paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictPair {
    pub scope_key: String,
    pub first: RecordId,
    pub second: RecordId,
    /// Start of the shared window.
    pub overlap_start: DateTime<Utc>,
    /// End of the shared window (equal to the start when they merely touch).
    pub overlap_end: DateTime<Utc>,
}

impl ConflictPair {
    /// The id pair as a tuple.
    pub fn ids(&self) -> (&RecordId, &RecordId) {
        (&self.first, &self.second)
    }
}

/// Headline numbers for an activity snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Records handed to the engine.
    pub total_records: usize,
    /// Records with an active status.
    pub active_records: usize,
    /// Records excluded for not being active.
    pub inactive_excluded: usize,
    /// Sum of normalized quantities over active records.
    pub total_quantity: u64,
    /// Totals per normalized type.
    pub by_type: BTreeMap<String, u64>,
}

/// Metadata about a generated report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Activity records loaded from input.
    pub records_loaded: usize,
    /// Calendar events loaded from input.
    pub events_loaded: usize,
    /// Records dropped as duplicate ids.
    pub duplicates_dropped: usize,
    /// Grouping applied to the activity records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_by: Option<GroupBy>,
}

/// The complete report: aggregates and/or schedule conflicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ActivitySummary>,
    #[serde(default)]
    pub buckets: Vec<AggregateBucket>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<ConflictPair>>,
}

impl Report {
    /// Creates an empty report with the given metadata.
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            summary: None,
            buckets: Vec::new(),
            conflicts: None,
        }
    }

    /// Number of conflicts found, zero when conflicts were not computed.
    pub fn conflict_count(&self) -> usize {
        self.conflicts.as_ref().map_or(0, Vec::len)
    }
}
