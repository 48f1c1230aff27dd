//! Engine error taxonomy.
//!
//! Malformed scalar fields on activity records are never errors; they are
//! normalized away. Only a missing collection or an inverted event interval
//! fails a call.

use crate::models::RecordId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by the aggregation and conflict engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A required collection argument was absent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A calendar event ends before it starts.
    #[error("invalid interval on event {event_id}: end {end} precedes start {start}")]
    InvalidInterval {
        event_id: RecordId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl EngineError {
    /// Shorthand for a missing collection named `what`.
    pub fn missing(what: &str) -> Self {
        EngineError::InvalidArgument(format!("`{}` collection is required", what))
    }
}
