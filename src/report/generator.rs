//! Markdown and JSON report generation.
//!
//! This module renders aggregate totals and schedule conflicts into
//! Markdown tables or pretty-printed JSON.

use crate::analysis::rank_types;
use crate::models::{
    ActivitySummary, AggregateBucket, ConflictPair, GroupBy, Report, ReportMetadata, TimeBucket,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Generate a complete Markdown report.
///
/// `top_types` caps the activity-type highlights in the summary.
pub fn generate_markdown_report(report: &Report, top_types: usize) -> String {
    let mut output = String::new();

    output.push_str("# Activity Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));

    if let Some(ref summary) = report.summary {
        output.push_str(&generate_summary_section(summary, top_types));
        let group_by = report.metadata.group_by.unwrap_or_default();
        output.push_str(&generate_totals_section(&report.buckets, &group_by));
    }

    if let Some(ref conflicts) = report.conflicts {
        output.push_str(&generate_conflicts_section(conflicts));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Records Loaded:** {}\n", metadata.records_loaded));
    if metadata.duplicates_dropped > 0 {
        section.push_str(&format!(
            "- **Duplicates Dropped:** {}\n",
            metadata.duplicates_dropped
        ));
    }
    section.push_str(&format!("- **Events Loaded:** {}\n", metadata.events_loaded));
    if let Some(ref group_by) = metadata.group_by {
        section.push_str(&format!("- **Grouped By:** {}\n", group_by.describe()));
    }
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    if report.summary.is_some() {
        toc.push_str("- [Summary](#summary)\n");
        toc.push_str("- [Totals](#totals)\n");
    }

    if let Some(ref conflicts) = report.conflicts {
        toc.push_str("- [Schedule Conflicts](#schedule-conflicts)\n");
        for scope in conflicts_by_scope(conflicts).keys() {
            toc.push_str(&format!("  - [{}](#{})\n", scope, anchor(scope)));
        }
    }

    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(summary: &ActivitySummary, top_types: usize) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Records | Active | Inactive Excluded | **Total Quantity** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.total_records,
        summary.active_records,
        summary.inactive_excluded,
        summary.total_quantity
    ));

    let ranked = rank_types(summary);
    if !ranked.is_empty() && top_types > 0 {
        section.push_str("### Top Activity Types\n\n");
        section.push_str("| Type | Total |\n");
        section.push_str("|:---|:---:|\n");

        for (activity_type, total) in ranked.into_iter().take(top_types) {
            section.push_str(&format!("| {} | {} |\n", activity_type, total));
        }
        section.push('\n');
    }

    section
}

/// Generate the totals table, one column per selected dimension.
fn generate_totals_section(buckets: &[AggregateBucket], group_by: &GroupBy) -> String {
    let mut section = String::new();

    section.push_str("## Totals\n\n");

    if buckets.is_empty() {
        section.push_str("No active records to aggregate.\n\n");
        return section;
    }

    let mut headers = Vec::new();
    if group_by.by_type {
        headers.push("Type");
    }
    if group_by.by_region {
        headers.push("Region");
    }
    if group_by.time_bucket.is_some() {
        headers.push("Period");
    }
    headers.push("Count");
    headers.push("Total");

    section.push_str(&format!("| {} |\n", headers.join(" | ")));
    section.push_str(&format!("|{}\n", ":---|".repeat(headers.len())));

    for bucket in buckets {
        let mut cells = Vec::new();
        if group_by.by_type {
            cells.push(bucket.activity_type.clone().unwrap_or_default());
        }
        if group_by.by_region {
            cells.push(bucket.region.clone().unwrap_or_default());
        }
        if let Some(granularity) = group_by.time_bucket {
            cells.push(
                bucket
                    .time_bucket
                    .map_or_else(|| "undated".to_string(), |start| format_period(start, granularity)),
            );
        }
        cells.push(bucket.count.to_string());
        cells.push(bucket.total.to_string());

        section.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    section.push('\n');

    section
}

/// Generate the schedule conflicts section, grouped by scope.
fn generate_conflicts_section(conflicts: &[ConflictPair]) -> String {
    let mut section = String::new();

    section.push_str("## Schedule Conflicts\n\n");

    if conflicts.is_empty() {
        section.push_str("No schedule conflicts found.\n\n");
        return section;
    }

    section.push_str(&format!("**Total conflicts:** {}\n\n", conflicts.len()));

    for (scope, pairs) in conflicts_by_scope(conflicts) {
        section.push_str(&format!("### {}\n\n", scope));
        section.push_str("| Event | Conflicts With | Overlap |\n");
        section.push_str("|:---|:---|:---|\n");

        for pair in pairs {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                pair.first,
                pair.second,
                format_overlap(pair)
            ));
        }
        section.push('\n');
    }

    section
}

fn conflicts_by_scope(conflicts: &[ConflictPair]) -> BTreeMap<&str, Vec<&ConflictPair>> {
    let mut grouped: BTreeMap<&str, Vec<&ConflictPair>> = BTreeMap::new();
    for pair in conflicts {
        grouped.entry(pair.scope_key.as_str()).or_default().push(pair);
    }
    grouped
}

fn format_period(start: DateTime<Utc>, granularity: TimeBucket) -> String {
    match granularity {
        TimeBucket::Day => start.format("%Y-%m-%d").to_string(),
        TimeBucket::Week => format!("week of {}", start.format("%Y-%m-%d")),
        TimeBucket::Month => start.format("%Y-%m").to_string(),
        TimeBucket::Year => start.format("%Y").to_string(),
    }
}

fn format_overlap(pair: &ConflictPair) -> String {
    let start = pair.overlap_start.format("%Y-%m-%d %H:%M");
    if pair.overlap_start == pair.overlap_end {
        format!("at {}", start)
    } else {
        format!("{} to {}", start, pair.overlap_end.format("%Y-%m-%d %H:%M"))
    }
}

/// Heading slug as GitHub renders it: lowercased, punctuation dropped,
/// spaces turned into hyphens.
fn anchor(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by activity-engine v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
