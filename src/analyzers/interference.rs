//! Express/local interference: express arrivals trailing a local too closely.
//!
//! Only a few lines run express service (line 9, parts of line 1); lines with
//! no express-flagged visit anywhere in the batch are reported as having no
//! express service observed, which is different from having express service
//! and no close pairs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::AnalysisConfig;
use crate::reconstruct::Visit;
use crate::snapshot::Direction;

/// An express arrival paired with the nearest preceding local arrival at the
/// same (line, station, direction).
#[derive(Debug, Serialize)]
pub struct InterferencePair {
    pub line_name: String,
    pub station_name: String,
    pub direction: Direction,
    pub express_train: String,
    pub local_train: String,
    pub express_arrival: DateTime<Utc>,
    pub headway_sec: f64,
    /// True when the gap is below the proximity threshold.
    pub flagged: bool,
}

#[derive(Debug, Serialize)]
pub struct InterferenceReport {
    pub pairs: Vec<InterferencePair>,
    pub flagged_count: usize,
    /// Lines where at least one express-flagged visit was observed.
    pub express_lines: Vec<String>,
    /// Lines present in the batch with no express service observed; skipped.
    pub lines_without_express: Vec<String>,
    pub insufficient_data: bool,
}

/// Correlates express and local arrivals per (line, station, direction).
pub fn analyze(visits: &[Visit], config: &AnalysisConfig) -> InterferenceReport {
    let arrival_policy = config.count_entering_as_arrival;

    let mut all_lines: BTreeSet<&str> = BTreeSet::new();
    let mut express_lines: BTreeSet<&str> = BTreeSet::new();
    for visit in visits {
        all_lines.insert(visit.line_name.as_str());
        if visit.is_express {
            express_lines.insert(visit.line_name.as_str());
        }
    }

    let mut groups: BTreeMap<(String, String, Direction), Vec<&Visit>> = BTreeMap::new();
    for visit in visits {
        if !express_lines.contains(visit.line_name.as_str()) {
            continue;
        }
        if !visit.counts_as_arrival(arrival_policy) || visit.arrival_time.is_none() {
            continue;
        }
        groups
            .entry((
                visit.line_name.clone(),
                visit.station_name.clone(),
                visit.direction,
            ))
            .or_default()
            .push(visit);
    }

    let mut pairs = Vec::new();

    for ((line_name, station_name, direction), mut arrivals) in groups {
        arrivals.sort_by_key(|v| v.arrival_time);
        let (express, locals): (Vec<&Visit>, Vec<&Visit>) =
            arrivals.iter().copied().partition(|v| v.is_express);
        if express.is_empty() || locals.is_empty() {
            continue;
        }

        for exp in express {
            let exp_arrival = exp.arrival_time.unwrap();
            // Nearest preceding local: greatest arrival strictly before the
            // express arrival. Locals are already time-ordered.
            let Some(local) = locals
                .iter()
                .take_while(|l| l.arrival_time.unwrap() < exp_arrival)
                .last()
            else {
                continue;
            };

            let headway_sec = (exp_arrival - local.arrival_time.unwrap()).num_milliseconds()
                as f64
                / 1000.0;
            pairs.push(InterferencePair {
                line_name: line_name.clone(),
                station_name: station_name.clone(),
                direction,
                express_train: exp.train_number.clone(),
                local_train: local.train_number.clone(),
                express_arrival: exp_arrival,
                headway_sec,
                flagged: headway_sec < config.interference_proximity_sec,
            });
        }
    }

    InterferenceReport {
        flagged_count: pairs.iter().filter(|p| p.flagged).count(),
        insufficient_data: pairs.is_empty(),
        pairs,
        express_lines: express_lines.iter().map(|l| l.to_string()).collect(),
        lines_without_express: all_lines
            .difference(&express_lines)
            .map(|l| l.to_string())
            .collect(),
    }
}
