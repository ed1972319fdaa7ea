//! Batch loading: reads a snapshot collection from a CSV export or a JSON
//! position payload and applies the batch limit.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use tracing::{info, warn};

use crate::parser::parse_positions;
use crate::snapshot::{RawSnapshot, Snapshot};

/// A loaded batch and what was dropped on the way in.
#[derive(Debug, Serialize)]
pub struct Batch {
    pub snapshots: Vec<Snapshot>,
    pub malformed_rows: usize,
    /// Rows beyond `batch_limit`, dropped in arrival order.
    pub truncated_rows: usize,
}

/// Loads a batch from a file, dispatching on extension: `.json` is treated as
/// a realtime-position payload, anything else as a collector CSV export.
pub fn load_batch(path: &Path, batch_limit: usize) -> Result<Batch> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let mut batch = if is_json {
        let bytes = std::fs::read(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let (snapshots, malformed_rows) = parse_positions(&bytes)?;
        Batch {
            snapshots,
            malformed_rows,
            truncated_rows: 0,
        }
    } else {
        load_csv(path)?
    };

    if batch.snapshots.len() > batch_limit {
        batch.truncated_rows = batch.snapshots.len() - batch_limit;
        batch.snapshots.truncate(batch_limit);
        warn!(
            batch_limit,
            truncated = batch.truncated_rows,
            "Batch exceeds limit, truncating in arrival order"
        );
    }

    info!(
        rows = batch.snapshots.len(),
        malformed = batch.malformed_rows,
        source = %path.display(),
        "Batch loaded"
    );
    Ok(batch)
}

fn load_csv(path: &Path) -> Result<Batch> {
    let file =
        File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);

    let mut snapshots = Vec::new();
    let mut malformed_rows = 0;

    for result in rdr.deserialize() {
        // A row that doesn't even deserialize (wrong column count) is
        // malformed too, not fatal.
        let raw: RawSnapshot = match result {
            Ok(raw) => raw,
            Err(_) => {
                malformed_rows += 1;
                continue;
            }
        };
        match raw.validate() {
            Ok(snap) => snapshots.push(snap),
            Err(_) => malformed_rows += 1,
        }
    }

    Ok(Batch {
        snapshots,
        malformed_rows,
        truncated_rows: 0,
    })
}
