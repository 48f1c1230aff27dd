//! Activity aggregation and statistics.
//!
//! This module rolls normalized activity records up into totals keyed by
//! type, region, and time bucket, and computes summary statistics for a
//! snapshot.

use crate::analysis::normalize::{normalize_record, truncate_to_bucket, NormalizedRecord};
use crate::error::EngineError;
use crate::models::{ActivityRecord, ActivitySummary, AggregateBucket, GroupBy, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Composite grouping key; unselected dimensions are `None`.
type BucketKey = (Option<String>, Option<String>, Option<DateTime<Utc>>);

/// An aggregation call as handed over by the API layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// Records to aggregate; `None` means the caller sent nothing.
    #[serde(default)]
    pub records: Option<Vec<ActivityRecord>>,
    #[serde(default)]
    pub group_by: GroupBy,
}

impl AggregateRequest {
    /// Run the aggregation, rejecting a missing record collection.
    pub fn run(&self) -> Result<Vec<AggregateBucket>, EngineError> {
        let records = self
            .records
            .as_deref()
            .ok_or_else(|| EngineError::missing("records"))?;
        Ok(aggregate(records, &self.group_by))
    }
}

/// Aggregate active records into buckets.
///
/// Output is sorted by type, then region, then time bucket. Inactive records
/// are dropped after normalization and never contribute. With time bucketing,
/// records without a usable timestamp share a bucket whose start is `None`,
/// ordered before every dated bucket.
pub fn aggregate(records: &[ActivityRecord], group_by: &GroupBy) -> Vec<AggregateBucket> {
    let mut grouped: BTreeMap<BucketKey, (usize, u64)> = BTreeMap::new();
    let mut excluded = 0usize;

    for record in records.iter().map(normalize_record) {
        if !record.active {
            excluded += 1;
            continue;
        }

        let (count, total) = grouped.entry(bucket_key(&record, group_by)).or_default();
        *count += 1;
        *total = total.saturating_add(record.quantity);
    }

    debug!(
        "Aggregated {} records into {} buckets by {} ({} inactive excluded)",
        records.len() - excluded,
        grouped.len(),
        group_by.describe(),
        excluded
    );

    grouped
        .into_iter()
        .map(|((activity_type, region, time_bucket), (count, total))| AggregateBucket {
            activity_type,
            region,
            time_bucket,
            count,
            total,
        })
        .collect()
}

fn bucket_key(record: &NormalizedRecord, group_by: &GroupBy) -> BucketKey {
    (
        group_by.by_type.then(|| record.activity_type.clone()),
        group_by.by_region.then(|| record.region.clone()),
        group_by
            .time_bucket
            .zip(record.occurred_at)
            .map(|(bucket, at)| truncate_to_bucket(at, bucket)),
    )
}

/// Drop records whose id was already seen, keeping the first occurrence.
///
/// Returns the surviving records in input order and the number dropped.
pub fn dedupe_by_id(records: Vec<ActivityRecord>) -> (Vec<ActivityRecord>, usize) {
    let mut seen: HashSet<RecordId> = HashSet::new();
    let before = records.len();

    let kept: Vec<ActivityRecord> = records
        .into_iter()
        .filter(|record| seen.insert(record.id.clone()))
        .collect();

    let dropped = before - kept.len();
    if dropped > 0 {
        debug!("Dropped {} duplicate activity records", dropped);
    }

    (kept, dropped)
}

/// Compute headline statistics for a snapshot.
pub fn summarize(records: &[ActivityRecord]) -> ActivitySummary {
    let mut summary = ActivitySummary {
        total_records: records.len(),
        ..ActivitySummary::default()
    };

    for record in records.iter().map(normalize_record) {
        if !record.active {
            summary.inactive_excluded += 1;
            continue;
        }

        summary.active_records += 1;
        summary.total_quantity = summary.total_quantity.saturating_add(record.quantity);
        let entry = summary.by_type.entry(record.activity_type).or_insert(0);
        *entry = entry.saturating_add(record.quantity);
    }

    summary
}

/// Activity types ranked by total (largest first, ties by name).
pub fn rank_types(summary: &ActivitySummary) -> Vec<(&str, u64)> {
    let mut ranked: Vec<(&str, u64)> = summary
        .by_type
        .iter()
        .map(|(name, total)| (name.as_str(), *total))
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::normalize::normalize_quantity;
    use crate::models::TimeBucket;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    fn create_test_record(
        id: i64,
        activity_type: &str,
        region: Option<&str>,
        quantity: Value,
        status: &str,
    ) -> ActivityRecord {
        ActivityRecord {
            id: RecordId::Number(id),
            activity_type: Some(activity_type.to_string()),
            region: region.map(String::from),
            quantity: Some(quantity),
            occurred_at: Some(Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap()),
            status: Some(status.to_string()),
        }
    }

    #[test]
    fn test_aggregate_example_type_and_region() {
        let records = vec![
            create_test_record(1, "NPS", Some("sul"), json!("5"), "active"),
            create_test_record(2, "NPS", Some("sul"), Value::Null, "active"),
            create_test_record(3, "NPS", Some("sul"), json!(10), "inactive"),
        ];

        let buckets = aggregate(&records, &GroupBy::type_and_region());

        assert_eq!(
            buckets,
            vec![AggregateBucket {
                activity_type: Some("NPS".to_string()),
                region: Some("sul".to_string()),
                time_bucket: None,
                count: 2,
                total: 5,
            }]
        );
    }

    #[test]
    fn test_aggregate_empty() {
        assert!(aggregate(&[], &GroupBy::type_and_region()).is_empty());
    }

    #[test]
    fn test_aggregate_output_order() {
        let records = vec![
            create_test_record(1, "diagnostics_performed", Some("sul"), json!(1), "active"),
            create_test_record(2, "NPS", Some("sul"), json!(2), "active"),
            create_test_record(3, "NPS", Some("norte"), json!(3), "active"),
            create_test_record(4, "NPS", None, json!(4), "active"),
        ];

        let buckets = aggregate(&records, &GroupBy::type_and_region());
        let keys: Vec<(&str, &str)> = buckets
            .iter()
            .map(|b| {
                (
                    b.activity_type.as_deref().unwrap_or_default(),
                    b.region.as_deref().unwrap_or_default(),
                )
            })
            .collect();

        assert_eq!(
            keys,
            vec![
                ("NPS", "norte"),
                ("NPS", "sul"),
                ("NPS", "unspecified"),
                ("diagnostics_performed", "sul"),
            ]
        );
    }

    #[test]
    fn test_aggregate_by_type_only_merges_regions() {
        let records = vec![
            create_test_record(1, "NPS", Some("sul"), json!(2), "active"),
            create_test_record(2, "NPS", Some("norte"), json!(3), "active"),
        ];

        let group_by = GroupBy {
            by_type: true,
            ..GroupBy::default()
        };
        let buckets = aggregate(&records, &group_by);

        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].region, None);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].total, 5);
    }

    #[test]
    fn test_aggregate_by_month() {
        let mut january = create_test_record(1, "NPS", Some("sul"), json!(1), "active");
        january.occurred_at = Some(Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap());
        let mut february = create_test_record(2, "NPS", Some("sul"), json!(2), "active");
        february.occurred_at = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());

        let group_by = GroupBy::type_and_region().with_bucket(TimeBucket::Month);
        let buckets = aggregate(&[february, january], &group_by);

        assert_eq!(buckets.len(), 2);
        assert_eq!(
            buckets[0].time_bucket,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(buckets[0].total, 1);
        assert_eq!(
            buckets[1].time_bucket,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(buckets[1].total, 2);
    }

    #[test]
    fn test_undated_records_keep_contributing_when_bucketed() {
        let dated = create_test_record(1, "NPS", Some("sul"), json!(4), "active");
        let mut undated = create_test_record(2, "NPS", Some("sul"), json!(6), "active");
        undated.occurred_at = None;

        let group_by = GroupBy::type_and_region().with_bucket(TimeBucket::Day);
        let buckets = aggregate(&[dated, undated], &group_by);

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].time_bucket, None);
        assert_eq!(buckets[0].total, 6);
        assert_eq!(
            buckets[1].time_bucket,
            Some(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap())
        );
        assert_eq!(buckets.iter().map(|b| b.total).sum::<u64>(), 10);
    }

    #[test]
    fn test_blank_type_goes_to_untyped() {
        let records = vec![create_test_record(1, "  ", Some("sul"), json!(3), "active")];
        let buckets = aggregate(&records, &GroupBy::type_and_region());
        assert_eq!(buckets[0].activity_type.as_deref(), Some("untyped"));
    }

    #[test]
    fn test_request_without_records_is_invalid() {
        let request: AggregateRequest =
            serde_json::from_str(r#"{"records": null, "groupBy": {"byType": true}}"#).unwrap();
        assert_eq!(request.run(), Err(EngineError::missing("records")));

        let request: AggregateRequest = serde_json::from_str(r#"{"records": []}"#).unwrap();
        assert_eq!(request.run(), Ok(Vec::new()));
    }

    #[test]
    fn test_dedupe_by_id_keeps_first() {
        let records = vec![
            create_test_record(1, "NPS", Some("sul"), json!(5), "active"),
            create_test_record(2, "NPS", Some("sul"), json!(1), "active"),
            create_test_record(1, "NPS", Some("sul"), json!(9), "active"),
        ];

        let (kept, dropped) = dedupe_by_id(records);

        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].quantity, Some(json!(5)));
    }

    #[test]
    fn test_summarize_and_rank_types() {
        let records = vec![
            create_test_record(1, "NPS", Some("sul"), json!(5), "active"),
            create_test_record(2, "diagnostics_performed", Some("sul"), json!(8), "active"),
            create_test_record(3, "NPS", Some("norte"), json!(2), "active"),
            create_test_record(4, "NPS", Some("norte"), json!(100), "deleted"),
        ];

        let summary = summarize(&records);

        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.active_records, 3);
        assert_eq!(summary.inactive_excluded, 1);
        assert_eq!(summary.total_quantity, 15);
        assert_eq!(
            rank_types(&summary),
            vec![("diagnostics_performed", 8), ("NPS", 7)]
        );
    }

    fn arb_quantity() -> impl Strategy<Value = Option<Value>> {
        prop_oneof![
            Just(None),
            Just(Some(Value::Null)),
            any::<i32>().prop_map(|n| Some(json!(n))),
            "[0-9a-z -]{0,6}".prop_map(|s| Some(Value::String(s))),
        ]
    }

    fn arb_record() -> impl Strategy<Value = ActivityRecord> {
        (
            0i64..40,
            prop::option::of(prop_oneof![
                Just("NPS".to_string()),
                Just("nps".to_string()),
                Just(" ".to_string()),
                Just("diagnostics_performed".to_string()),
            ]),
            prop::option::of(prop_oneof![
                Just("sul".to_string()),
                Just("norte".to_string()),
                Just(String::new()),
            ]),
            arb_quantity(),
            prop::option::of(0i64..(400 * 86_400)),
            prop::option::of(prop_oneof![
                Just("active".to_string()),
                Just("inactive".to_string()),
            ]),
        )
            .prop_map(|(id, activity_type, region, quantity, offset, status)| ActivityRecord {
                id: RecordId::Number(id),
                activity_type,
                region,
                quantity,
                occurred_at: offset.map(|o| Utc.timestamp_opt(1_700_000_000 + o, 0).unwrap()),
                status,
            })
    }

    fn arb_group_by() -> impl Strategy<Value = GroupBy> {
        (
            any::<bool>(),
            any::<bool>(),
            prop::option::of(prop_oneof![
                Just(TimeBucket::Day),
                Just(TimeBucket::Week),
                Just(TimeBucket::Month),
                Just(TimeBucket::Year),
            ]),
        )
            .prop_map(|(by_type, by_region, time_bucket)| GroupBy {
                by_type,
                by_region,
                time_bucket,
            })
    }

    proptest! {
        #[test]
        fn property_aggregate_is_idempotent(
            records in prop::collection::vec(arb_record(), 0..40),
            group_by in arb_group_by(),
        ) {
            prop_assert_eq!(aggregate(&records, &group_by), aggregate(&records, &group_by));
        }

        #[test]
        fn property_totals_equal_active_quantities(
            records in prop::collection::vec(arb_record(), 0..40),
            group_by in arb_group_by(),
        ) {
            let buckets = aggregate(&records, &group_by);
            let expected: u64 = records
                .iter()
                .filter(|r| r.status.as_deref() == Some("active"))
                .map(|r| normalize_quantity(r.quantity.as_ref()))
                .sum();
            let expected_count = records
                .iter()
                .filter(|r| r.status.as_deref() == Some("active"))
                .count();

            prop_assert_eq!(buckets.iter().map(|b| b.total).sum::<u64>(), expected);
            prop_assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), expected_count);
        }

        #[test]
        fn property_inactive_records_contribute_nothing(
            records in prop::collection::vec(arb_record(), 0..40),
            group_by in arb_group_by(),
        ) {
            let active_only: Vec<ActivityRecord> = records
                .iter()
                .filter(|r| r.status.as_deref() == Some("active"))
                .cloned()
                .collect();

            prop_assert_eq!(aggregate(&records, &group_by), aggregate(&active_only, &group_by));
        }
    }
}
