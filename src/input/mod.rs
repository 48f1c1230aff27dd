//! Snapshot loading for activity records and calendar events.
//!
//! The data-access layer exports what it fetched as JSON: either a bare
//! array or an object wrapping the array under `records` / `events`. A path
//! may also be a directory of such files, read in sorted order.

use crate::error::EngineError;
use crate::models::{ActivityRecord, CalendarEvent};
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Load activity records from a snapshot file or directory.
pub fn load_records(path: &Path) -> Result<Vec<ActivityRecord>> {
    let records = load_collection(path, "records")?;
    info!("Loaded {} activity records from {}", records.len(), path.display());
    Ok(records)
}

/// Load calendar events from a snapshot file or directory.
pub fn load_events(path: &Path) -> Result<Vec<CalendarEvent>> {
    let events = load_collection(path, "events")?;
    info!("Loaded {} calendar events from {}", events.len(), path.display());
    Ok(events)
}

/// List snapshot files under `path`.
///
/// A file is returned as-is. A directory is walked for `*.json` files,
/// skipping hidden entries, sorted by path.
pub fn snapshot_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Snapshot path does not exist: {}", path.display());
    }

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
        let file_path = entry.path();
        if entry.file_type().is_file() && has_json_extension(file_path) {
            files.push(file_path.to_path_buf());
        } else {
            debug!("Skipping {}", file_path.display());
        }
    }

    files.sort();
    Ok(files)
}

fn load_collection<T: DeserializeOwned>(path: &Path, key: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();

    for file in snapshot_files(path)? {
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read snapshot: {}", file.display()))?;
        let mut parsed: Vec<T> = parse_collection(&content, key)
            .with_context(|| format!("Failed to parse snapshot: {}", file.display()))?;
        debug!("{}: {} {}", file.display(), parsed.len(), key);
        items.append(&mut parsed);
    }

    Ok(items)
}

/// Parse a bare array or an object carrying the array under `key`.
///
/// An object whose `key` is missing or null is rejected as a missing
/// collection.
pub fn parse_collection<T: DeserializeOwned>(content: &str, key: &str) -> Result<Vec<T>> {
    let value: Value = serde_json::from_str(content).context("Invalid JSON")?;

    let array = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Null) | None => return Err(EngineError::missing(key).into()),
            Some(inner) => inner,
        },
        other => bail!("Expected an array or object, found {}", json_kind(&other)),
    };

    serde_json::from_value(array).with_context(|| format!("Malformed `{}` entries", key))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

fn has_json_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
