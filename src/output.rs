//! Output formatting and persistence for batch reports.
//!
//! Supports pretty-printing, JSON serialization, and per-table CSV append.

use anyhow::Result;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::report::BatchReport;
use csv::WriterBuilder;

/// Serializes a report as pretty-printed JSON.
pub fn to_json_pretty(report: &BatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Appends serializable rows to a CSV file.
///
/// Creates the file with headers if it does not already exist, so repeated
/// batch runs accumulate into the same table.
pub fn append_records<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = rows.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes each result table of a report as CSV under `dir`.
pub fn write_report_tables(dir: &Path, report: &BatchReport) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    append_records(&dir.join("headway.csv"), &report.headway.records)?;
    append_records(&dir.join("headway_groups.csv"), &report.headway.groups)?;
    append_records(&dir.join("dwell.csv"), &report.dwell.records)?;
    append_records(&dir.join("turnaround.csv"), &report.turnaround.events)?;
    append_records(
        &dir.join("turnaround_stations.csv"),
        &report.turnaround.station_means,
    )?;
    append_records(&dir.join("interference.csv"), &report.interference.pairs)?;

    info!(dir = %dir.display(), "Report tables written");
    Ok(())
}
