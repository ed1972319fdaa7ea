//! Dwell analysis: time spent at each station per visit, with long-stop flags.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::reconstruct::Visit;
use crate::snapshot::Direction;

/// Per-visit dwell duration. A dwell of 0 means the train was observed once
/// and inferred to have passed between polling cycles; it is a real value.
#[derive(Debug, Serialize)]
pub struct DwellRecord {
    pub line_name: String,
    pub station_name: String,
    pub train_number: String,
    pub direction: Direction,
    pub arrival_time: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
    pub dwell_sec: f64,
    pub sample_count: usize,
    /// True when the dwell meets the long-stop threshold (delay suspicion).
    pub long_stop: bool,
}

#[derive(Debug, Serialize)]
pub struct DwellReport {
    pub records: Vec<DwellRecord>,
    pub long_stop_count: usize,
    pub insufficient_data: bool,
}

/// Computes dwell durations for completed visits.
///
/// Incomplete visits (still open at batch end) are excluded; a dwell for a
/// stay whose departure was never observed would be a lower bound, not a
/// measurement.
pub fn analyze(visits: &[Visit], config: &AnalysisConfig) -> DwellReport {
    let mut records: Vec<DwellRecord> = visits
        .iter()
        .filter(|v| v.complete)
        .map(|v| {
            let dwell_sec = v.dwell_sec();
            DwellRecord {
                line_name: v.line_name.clone(),
                station_name: v.station_name.clone(),
                train_number: v.train_number.clone(),
                direction: v.direction,
                arrival_time: v.arrival_time.unwrap_or(v.first_observed),
                departure_time: v.last_observed,
                dwell_sec,
                sample_count: v.sample_count,
                long_stop: dwell_sec >= config.long_stop_threshold_sec,
            }
        })
        .collect();

    // Longest stops first, the same way the delay-hotspot report reads.
    records.sort_by(|a, b| {
        b.dwell_sec
            .total_cmp(&a.dwell_sec)
            .then_with(|| a.arrival_time.cmp(&b.arrival_time))
    });

    DwellReport {
        long_stop_count: records.iter().filter(|r| r.long_stop).count(),
        insufficient_data: records.is_empty(),
        records,
    }
}
