//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{GroupBy, TimeBucket};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Activity Engine - regional activity totals and schedule conflicts
///
/// Reads JSON snapshots exported from the program database, rolls activity
/// records up into totals, and reports overlapping calendar events within
/// each region or responsible party.
///
/// Examples:
///   activity-engine --records snapshots/activities.json --by-type --by-region
///   activity-engine --records snapshots/ --bucket month --format json -o totals.json
///   activity-engine --events calendar.json --fail-on-conflict
///   activity-engine --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Activity records snapshot (JSON file or directory of JSON files)
    #[arg(short, long, value_name = "PATH", env = "ACTIVITY_ENGINE_RECORDS")]
    pub records: Option<PathBuf>,

    /// Calendar events snapshot (JSON file or directory of JSON files)
    #[arg(short, long, value_name = "PATH", env = "ACTIVITY_ENGINE_EVENTS")]
    pub events: Option<PathBuf>,

    /// Group totals by activity type
    #[arg(long)]
    pub by_type: bool,

    /// Group totals by region
    #[arg(long)]
    pub by_region: bool,

    /// Group totals by time bucket (UTC)
    #[arg(long, value_name = "GRANULARITY")]
    pub bucket: Option<TimeBucket>,

    /// Drop activity records whose id was already seen
    #[arg(long)]
    pub dedupe: bool,

    /// Output file path for the report ("-" for stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .activity-engine.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Exit with code 2 when any schedule conflict is found
    ///
    /// Useful for scheduled checks on the calendar export.
    #[arg(long)]
    pub fail_on_conflict: bool,

    /// Generate a default .activity-engine.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.records.is_none() && self.events.is_none() {
            return Err("Nothing to do: pass --records and/or --events".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.fail_on_conflict && self.events.is_none() {
            return Err("--fail-on-conflict requires --events".to_string());
        }

        for path in [&self.records, &self.events].into_iter().flatten() {
            if !path.exists() {
                return Err(format!("Snapshot path does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Grouping requested on the command line, if any flag was given.
    pub fn group_by(&self) -> Option<GroupBy> {
        if !self.by_type && !self.by_region && self.bucket.is_none() {
            return None;
        }

        Some(GroupBy {
            by_type: self.by_type,
            by_region: self.by_region,
            time_bucket: self.bucket,
        })
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
