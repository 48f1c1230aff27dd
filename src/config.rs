//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.activity-engine.toml` files. The engine never reads it; the binary
//! turns it into explicit call-time parameters.

use crate::cli::{Args, OutputFormat};
use crate::models::{GroupBy, TimeBucket};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".activity-engine.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// How activity records are grouped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Group by activity type.
    #[serde(default = "default_true")]
    pub by_type: bool,

    /// Group by region.
    #[serde(default = "default_true")]
    pub by_region: bool,

    /// Time bucket granularity; no time grouping when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<TimeBucket>,

    /// Drop records with a repeated id before aggregating.
    #[serde(default)]
    pub dedupe: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            by_type: true,
            by_region: true,
            bucket: None,
            dedupe: false,
        }
    }
}

impl AggregationConfig {
    /// The grouping these settings describe.
    pub fn group_by(&self) -> GroupBy {
        GroupBy {
            by_type: self.by_type,
            by_region: self.by_region,
            time_bucket: self.bucket,
        }
    }
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Output format.
    #[serde(default)]
    pub format: OutputFormat,

    /// Number of activity types listed in the Markdown highlights.
    #[serde(default = "default_top_types")]
    pub top_types: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            format: OutputFormat::default(),
            top_types: default_top_types(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output() -> String {
    "activity_report.md".to_string()
}

fn default_top_types() -> usize {
    5
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load configuration from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Any grouping
    /// flag on the command line replaces the configured grouping entirely.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(group_by) = args.group_by() {
            self.aggregation.by_type = group_by.by_type;
            self.aggregation.by_region = group_by.by_region;
            self.aggregation.bucket = group_by.time_bucket;
        }

        if args.dedupe {
            self.aggregation.dedupe = true;
        }

        if let Some(format) = args.format {
            self.report.format = format;
        }
        if let Some(ref output) = args.output {
            self.report.output = output.to_string_lossy().to_string();
        }
    }

    /// Where the report is written; `None` means stdout.
    pub fn output_path(&self) -> Option<PathBuf> {
        match self.report.output.as_str() {
            "-" => None,
            path => Some(PathBuf::from(path)),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
