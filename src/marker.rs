//! Marker files and the daily ledger.
//!
//! A marker is a small generated file whose only purpose is to give a commit
//! something to change. Markers are written once and never touched again.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// ISO-8601 UTC with a `Z` suffix and microsecond precision.
pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn render(now: DateTime<Utc>) -> String {
    format!(
        "# Contribution\n\nRecorded at {}\n\nThis file was generated to record activity on this repository.\n",
        timestamp(now)
    )
}

/// Create the marker at `path`, including missing parent directories.
///
/// # Errors
/// Fails if a file already exists at `path`; markers are never overwritten.
pub fn write_marker(path: &Path, now: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut f = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("failed to create marker {}", path.display()))?;
    f.write_all(render(now).as_bytes())?;
    Ok(())
}

pub fn ledger_line(now: DateTime<Utc>) -> String {
    format!("- {}\n", timestamp(now))
}

/// Parse one ledger line of the form `- <timestamp>`.
///
/// Accepts a trailing `Z`, an explicit offset, fractional seconds, or a bare
/// date. Anything else is `None`.
pub fn parse_entry(line: &str) -> Option<DateTime<Utc>> {
    let raw = line.trim().strip_prefix("- ")?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Last non-blank line of the ledger, if any.
pub fn last_line(text: &str) -> Option<&str> {
    text.lines().rev().find(|l| !l.trim().is_empty())
}

/// Timestamp of the last ledger entry; `None` when empty or malformed.
pub fn last_entry(text: &str) -> Option<DateTime<Utc>> {
    last_line(text).and_then(parse_entry)
}

/// Append one entry, creating the ledger (and its directory) if needed.
pub fn append_entry(path: &Path, now: DateTime<Utc>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&ledger_line(now));
    fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
