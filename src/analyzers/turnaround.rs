//! Turnaround analysis: direction reversals per train and how long they take.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::utility::mean;
use crate::config::AnalysisConfig;
use crate::reconstruct::Visit;
use crate::snapshot::Direction;

/// A detected direction reversal, anchored at the first visit in the new
/// direction. Duration is measured from the last observation in the old
/// direction.
#[derive(Debug, Serialize)]
pub struct TurnaroundEvent {
    pub train_number: String,
    pub station_name: String,
    pub line_name: String,
    pub previous_direction: Direction,
    pub new_direction: Direction,
    pub reversal_time: DateTime<Utc>,
    pub turnaround_duration_sec: f64,
}

/// Mean turnaround duration per reversal station, over retained events.
#[derive(Debug, Serialize)]
pub struct StationTurnaround {
    pub station_name: String,
    pub event_count: usize,
    pub mean_duration_sec: f64,
}

#[derive(Debug, Serialize)]
pub struct TurnaroundReport {
    pub events: Vec<TurnaroundEvent>,
    /// Reversals slower than `turnaround_max_sec`, dropped as end-of-service
    /// re-entries rather than operational turnarounds.
    pub excluded_slow: usize,
    pub station_means: Vec<StationTurnaround>,
    pub insufficient_data: bool,
}

/// Scans each train's visit sequence for direction changes.
///
/// Incomplete visits never anchor an event: without an observed departure in
/// the old direction the elapsed time would be meaningless. They may still
/// precede one, since their last observation is real.
pub fn analyze(visits: &[Visit], config: &AnalysisConfig) -> TurnaroundReport {
    let mut per_train: BTreeMap<&str, Vec<&Visit>> = BTreeMap::new();
    for visit in visits {
        per_train
            .entry(visit.train_number.as_str())
            .or_default()
            .push(visit);
    }

    let mut events = Vec::new();
    let mut excluded_slow = 0;

    for (_, mut train_visits) in per_train {
        train_visits.sort_by_key(|v| v.first_observed);

        for pair in train_visits.windows(2) {
            let (prev, curr) = (pair[0], pair[1]);
            if prev.direction == curr.direction {
                continue;
            }
            if !curr.complete {
                continue;
            }
            let reversal_time = curr.first_observed;
            let duration_sec =
                (reversal_time - prev.last_observed).num_milliseconds() as f64 / 1000.0;
            if duration_sec >= config.turnaround_max_sec {
                excluded_slow += 1;
                continue;
            }
            events.push(TurnaroundEvent {
                train_number: curr.train_number.clone(),
                station_name: curr.station_name.clone(),
                line_name: curr.line_name.clone(),
                previous_direction: prev.direction,
                new_direction: curr.direction,
                reversal_time,
                turnaround_duration_sec: duration_sec,
            });
        }
    }

    events.sort_by_key(|e| e.reversal_time);

    let mut per_station: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for event in &events {
        per_station
            .entry(event.station_name.as_str())
            .or_default()
            .push(event.turnaround_duration_sec);
    }
    let station_means = per_station
        .into_iter()
        .map(|(station, durations)| StationTurnaround {
            station_name: station.to_string(),
            event_count: durations.len(),
            mean_duration_sec: mean(&durations),
        })
        .collect();

    TurnaroundReport {
        insufficient_data: events.is_empty(),
        excluded_slow,
        events,
        station_means,
    }
}
