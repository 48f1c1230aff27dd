//! Activity Engine - aggregation and calendar-conflict core
//!
//! Turns raw regional activity rows into grouped totals and finds
//! overlapping scheduled events within a region or responsible party.
//! The engine holds no state and opens no connections; callers pass plain
//! data in and get derived views back.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod models;
pub mod report;

pub use analysis::{aggregate, find_conflicts, AggregateRequest, ConflictRequest};
pub use error::EngineError;
pub use models::{
    ActivityRecord, AggregateBucket, CalendarEvent, ConflictPair, GroupBy, RecordId, TimeBucket,
};
