//! Schedule conflict detection.
//!
//! Two events conflict when they share a scope key and their closed
//! effective intervals overlap: `s1 <= e2 && s2 <= e1`. Touching intervals
//! and point events sitting on another event's boundary count.

use crate::error::EngineError;
use crate::models::{CalendarEvent, ConflictPair};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A conflict-detection call as handed over by the API layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictRequest {
    /// Events to check; `None` means the caller sent nothing.
    #[serde(default)]
    pub events: Option<Vec<CalendarEvent>>,
}

impl ConflictRequest {
    /// Run detection, rejecting a missing event collection.
    pub fn run(&self) -> Result<Vec<ConflictPair>, EngineError> {
        let events = self
            .events
            .as_deref()
            .ok_or_else(|| EngineError::missing("events"))?;
        find_conflicts(events)
    }
}

/// Find every overlapping pair of events within each scope.
///
/// Fails with [`EngineError::InvalidInterval`] on the first event whose end
/// precedes its start; nothing is computed in that case. Pairs are sorted by
/// scope, then by id pair, and each appears once with the smaller id first.
pub fn find_conflicts(events: &[CalendarEvent]) -> Result<Vec<ConflictPair>, EngineError> {
    validate_intervals(events)?;

    let mut conflicts = Vec::new();
    for (scope_key, mut scoped) in partition_by_scope(events) {
        scoped.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
        sweep_scope(scope_key, &scoped, &mut conflicts);
    }

    conflicts.sort_by(|a, b| {
        a.scope_key
            .cmp(&b.scope_key)
            .then_with(|| a.first.cmp(&b.first))
            .then_with(|| a.second.cmp(&b.second))
    });

    debug!(
        "Found {} conflicts among {} events",
        conflicts.len(),
        events.len()
    );

    Ok(conflicts)
}

/// Reject any event whose end precedes its start.
pub fn validate_intervals(events: &[CalendarEvent]) -> Result<(), EngineError> {
    for event in events {
        if let Some(end) = event.end {
            if end < event.start {
                return Err(EngineError::InvalidInterval {
                    event_id: event.id.clone(),
                    start: event.start,
                    end,
                });
            }
        }
    }
    Ok(())
}

fn partition_by_scope(events: &[CalendarEvent]) -> BTreeMap<&str, Vec<&CalendarEvent>> {
    let mut scopes: BTreeMap<&str, Vec<&CalendarEvent>> = BTreeMap::new();
    for event in events {
        scopes.entry(event.scope_key.as_str()).or_default().push(event);
    }
    scopes
}

/// Compare each event against the later-starting events it still covers.
///
/// `scoped` must be sorted by start. Once a later event starts after the
/// current one's effective end, no event after it can overlap either.
fn sweep_scope(scope_key: &str, scoped: &[&CalendarEvent], out: &mut Vec<ConflictPair>) {
    for (i, current) in scoped.iter().enumerate() {
        let current_end = current.effective_end();

        for other in &scoped[i + 1..] {
            if other.start > current_end {
                break;
            }
            if current.id == other.id {
                debug!("Skipping events sharing id {} in scope {}", current.id, scope_key);
                continue;
            }
            out.push(make_pair(scope_key, current, other));
        }
    }
}

fn make_pair(scope_key: &str, a: &CalendarEvent, b: &CalendarEvent) -> ConflictPair {
    let (first, second) = if a.id <= b.id {
        (a.id.clone(), b.id.clone())
    } else {
        (b.id.clone(), a.id.clone())
    };

    ConflictPair {
        scope_key: scope_key.to_string(),
        first,
        second,
        overlap_start: a.start.max(b.start),
        overlap_end: a.effective_end().min(b.effective_end()),
    }
}

/// Overlap test on closed effective intervals.
pub fn overlaps(a: &CalendarEvent, b: &CalendarEvent) -> bool {
    a.start <= b.effective_end() && b.start <= a.effective_end()
}
