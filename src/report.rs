//! Report assembly: one reconstruction, four independent analyzer passes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::analyzers::{dwell, headway, interference, turnaround};
use crate::config::AnalysisConfig;
use crate::reconstruct::{self, Reconstruction, StaleTrain};
use crate::snapshot::Snapshot;

/// Data-quality summary for the batch, carried alongside the result tables.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub snapshot_count: usize,
    pub malformed_rows: usize,
    pub duplicate_rows: usize,
    pub unrecognized_status_rows: usize,
    pub trains_observed: usize,
    pub visit_count: usize,
    pub incomplete_visits: usize,
}

/// The full derived-metrics report for one batch. Each table stands alone;
/// consumers read them as plain structured data.
#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub headway: headway::HeadwayReport,
    pub dwell: dwell::DwellReport,
    pub turnaround: turnaround::TurnaroundReport,
    pub interference: interference::InterferenceReport,
    /// Present only when an explicit `as_of` instant was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_trains: Option<Vec<StaleTrain>>,
}

/// Runs the reconstructor once and fans the visit sequence out to all four
/// analyzers. `malformed_rows` comes from the loader, `as_of` enables the
/// stale-train check against that explicit instant.
///
/// An empty batch is not an error: every table comes back empty with its
/// `insufficient_data` flag set.
pub fn run_report(
    snapshots: &[Snapshot],
    config: &AnalysisConfig,
    malformed_rows: usize,
    as_of: Option<DateTime<Utc>>,
) -> BatchReport {
    let Reconstruction {
        visits,
        duplicate_rows,
        unrecognized_status_rows,
        trains_observed,
    } = reconstruct::reconstruct(snapshots);

    let summary = BatchSummary {
        snapshot_count: snapshots.len(),
        malformed_rows,
        duplicate_rows,
        unrecognized_status_rows,
        trains_observed,
        visit_count: visits.len(),
        incomplete_visits: visits.iter().filter(|v| !v.complete).count(),
    };

    info!(
        visits = summary.visit_count,
        trains = summary.trains_observed,
        "Running analyzers"
    );

    BatchReport {
        generated_at: Utc::now(),
        headway: headway::analyze(&visits, config),
        dwell: dwell::analyze(&visits, config),
        turnaround: turnaround::analyze(&visits, config),
        interference: interference::analyze(&visits, config),
        stale_trains: as_of
            .map(|ts| reconstruct::stale_trains(&visits, ts, config.stale_after_sec)),
        summary,
    }
}
