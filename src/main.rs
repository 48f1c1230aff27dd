//! Activity Engine - regional activity totals and schedule conflicts
//!
//! A CLI that loads JSON snapshots exported from the program database,
//! aggregates activity records, and detects overlapping calendar events.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, invalid interval, config failure, etc.)
//!   2 - Conflicts found with --fail-on-conflict

use activity_engine::cli::{Args, OutputFormat};
use activity_engine::config::{Config, CONFIG_FILE};
use activity_engine::input;
use activity_engine::report::{self, ReportInput};
use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("activity-engine v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\nError: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: write a default .activity-engine.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load, compute, and write the report. Returns the exit code.
fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let records = args
        .records
        .as_deref()
        .map(input::load_records)
        .transpose()?;
    let events = args
        .events
        .as_deref()
        .map(input::load_events)
        .transpose()?;

    let report = report::build_report(ReportInput {
        records,
        events,
        group_by: config.aggregation.group_by(),
        dedupe: config.aggregation.dedupe,
    })?;

    let output = match config.report.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&report, config.report.top_types)
        }
    };

    match config.output_path() {
        Some(path) => {
            std::fs::write(&path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to {}", path.display());
        }
        None => print!("{}", output),
    }

    if let Some(ref summary) = report.summary {
        info!(
            "{} active records, total quantity {}",
            summary.active_records, summary.total_quantity
        );
    }

    if args.fail_on_conflict && report.conflict_count() > 0 {
        warn!(
            "{} schedule conflicts found. Failing (exit code 2).",
            report.conflict_count()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
