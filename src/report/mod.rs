//! Report assembly and rendering.

pub mod generator;

pub use generator::{generate_json_report, generate_markdown_report};

use crate::analysis::{aggregate, dedupe_by_id, find_conflicts, summarize};
use crate::error::EngineError;
use crate::models::{ActivityRecord, CalendarEvent, GroupBy, Report, ReportMetadata};
use chrono::Utc;
use tracing::info;

/// Inputs for one report run. `None` means the section was not requested.
#[derive(Debug, Clone, Default)]
pub struct ReportInput {
    pub records: Option<Vec<ActivityRecord>>,
    pub events: Option<Vec<CalendarEvent>>,
    pub group_by: GroupBy,
    pub dedupe: bool,
}

/// Run the engine over the loaded snapshots and assemble a report.
pub fn build_report(input: ReportInput) -> Result<Report, EngineError> {
    let records_loaded = input.records.as_ref().map_or(0, Vec::len);
    let events_loaded = input.events.as_ref().map_or(0, Vec::len);

    let mut duplicates_dropped = 0;
    let records = match input.records {
        Some(records) if input.dedupe => {
            let (kept, dropped) = dedupe_by_id(records);
            duplicates_dropped = dropped;
            Some(kept)
        }
        other => other,
    };

    let mut report = Report::new(ReportMetadata {
        generated_at: Utc::now(),
        records_loaded,
        events_loaded,
        duplicates_dropped,
        group_by: records.as_ref().map(|_| input.group_by),
    });

    if let Some(ref events) = input.events {
        let conflicts = find_conflicts(events)?;
        info!("Found {} schedule conflicts", conflicts.len());
        report.conflicts = Some(conflicts);
    }

    if let Some(ref records) = records {
        report.buckets = aggregate(records, &input.group_by);
        report.summary = Some(summarize(records));
        info!("Aggregated into {} buckets", report.buckets.len());
    }

    Ok(report)
}
