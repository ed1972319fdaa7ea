//! Headway analysis: inter-arrival intervals per (line, station, direction).

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analyzers::utility::{max, mean, sample_stddev};
use crate::config::AnalysisConfig;
use crate::reconstruct::Visit;
use crate::snapshot::Direction;

/// One arrival in a (line, station, direction) group, with the gap to the
/// previous arrival. The first arrival of each group has no interval and is
/// excluded from the aggregates.
#[derive(Debug, Serialize)]
pub struct HeadwayRecord {
    pub line_name: String,
    pub station_name: String,
    pub direction: Direction,
    pub train_number: String,
    pub arrival_time: DateTime<Utc>,
    pub interval_sec: Option<f64>,
}

/// Interval statistics for one (line, station, direction) group.
#[derive(Debug, Serialize)]
pub struct HeadwayGroupStats {
    pub line_name: String,
    pub station_name: String,
    pub direction: Direction,
    /// Number of intervals, one less than the number of arrivals.
    pub interval_count: usize,
    pub mean_sec: f64,
    pub max_sec: f64,
    /// Sample standard deviation; 0 when fewer than two intervals exist.
    pub stddev_sec: f64,
}

#[derive(Debug, Serialize)]
pub struct HeadwayReport {
    pub records: Vec<HeadwayRecord>,
    pub groups: Vec<HeadwayGroupStats>,
    pub insufficient_data: bool,
}

/// Computes arrival headways over the visit sequence.
///
/// Only visits that count as arrivals under the configured policy
/// contribute; ENTERING-only visits are admitted only when
/// `count_entering_as_arrival` is on.
pub fn analyze(visits: &[Visit], config: &AnalysisConfig) -> HeadwayReport {
    let mut groups: BTreeMap<(String, String, Direction), Vec<&Visit>> = BTreeMap::new();
    for visit in visits {
        if !visit.counts_as_arrival(config.count_entering_as_arrival) {
            continue;
        }
        if visit.arrival_time.is_none() {
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

    let mut records = Vec::new();
    let mut stats = Vec::new();

    for ((line_name, station_name, direction), mut arrivals) in groups {
        arrivals.sort_by_key(|v| v.arrival_time);

        let mut intervals = Vec::new();
        let mut prev: Option<DateTime<Utc>> = None;
        for visit in &arrivals {
            let arrival = visit.arrival_time.unwrap();
            let interval_sec = prev.map(|p| (arrival - p).num_milliseconds() as f64 / 1000.0);
            if let Some(sec) = interval_sec {
                intervals.push(sec);
            }
            records.push(HeadwayRecord {
                line_name: line_name.clone(),
                station_name: station_name.clone(),
                direction,
                train_number: visit.train_number.clone(),
                arrival_time: arrival,
                interval_sec,
            });
            prev = Some(arrival);
        }

        let m = mean(&intervals);
        stats.push(HeadwayGroupStats {
            line_name,
            station_name,
            direction,
            interval_count: intervals.len(),
            mean_sec: m,
            max_sec: max(&intervals),
            stddev_sec: sample_stddev(&intervals, m),
        });
    }

    HeadwayReport {
        insufficient_data: records.is_empty(),
        records,
        groups: stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::reconstruct;
    use crate::snapshot::{Snapshot, TrainStatus};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_550_400 + secs, 0).unwrap()
    }

    fn arrival(train: &str, station: &str, secs: i64) -> Snapshot {
        Snapshot {
            line_id: "1002".into(),
            line_name: "Line 2".into(),
            station_id: "211".into(),
            station_name: station.into(),
            train_number: train.into(),
            direction: Direction::Up,
            status: TrainStatus::Arrived,
            is_express: false,
            is_last_train: false,
            destination_station_id: None,
            destination_station_name: None,
            observed_at: ts(secs),
        }
    }

    #[test]
    fn test_two_arrivals_one_interval() {
        let recon = reconstruct(&[
            arrival("1234", "Seongsu", 0),
            arrival("5678", "Seongsu", 300),
        ]);
        let report = analyze(&recon.visits, &AnalysisConfig::default());

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].interval_sec, None);
        assert_eq!(report.records[1].interval_sec, Some(300.0));

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.interval_count, 1);
        assert_eq!(group.mean_sec, 300.0);
        assert_eq!(group.max_sec, 300.0);
        assert_eq!(group.stddev_sec, 0.0);
        assert!(!report.insufficient_data);
    }

    #[test]
    fn test_intervals_are_non_negative() {
        let recon = reconstruct(&[
            arrival("5678", "Seongsu", 300),
            arrival("1234", "Seongsu", 0),
            arrival("9012", "Seongsu", 480),
        ]);
        let report = analyze(&recon.visits, &AnalysisConfig::default());
        for record in &report.records {
            if let Some(sec) = record.interval_sec {
                assert!(sec >= 0.0);
            }
        }
        assert_eq!(report.groups[0].interval_count, 2);
    }

    #[test]
    fn test_entering_only_visit_excluded_by_default() {
        let mut entering = arrival("1234", "Seongsu", 0);
        entering.status = TrainStatus::Entering;
        let recon = reconstruct(&[entering, arrival("5678", "Seongsu", 300)]);

        let report = analyze(&recon.visits, &AnalysisConfig::default());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].train_number, "5678");
    }

    #[test]
    fn test_entering_counts_with_policy_enabled() {
        let mut entering = arrival("1234", "Seongsu", 0);
        entering.status = TrainStatus::Entering;
        let recon = reconstruct(&[entering, arrival("5678", "Seongsu", 300)]);

        let config = AnalysisConfig {
            count_entering_as_arrival: true,
            ..AnalysisConfig::default()
        };
        let report = analyze(&recon.visits, &config);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.groups[0].interval_count, 1);
    }

    #[test]
    fn test_groups_split_by_direction() {
        let mut down = arrival("5678", "Seongsu", 60);
        down.direction = Direction::Down;
        let recon = reconstruct(&[arrival("1234", "Seongsu", 0), down]);

        let report = analyze(&recon.visits, &AnalysisConfig::default());
        assert_eq!(report.groups.len(), 2);
        for group in &report.groups {
            assert_eq!(group.interval_count, 0);
            assert_eq!(group.stddev_sec, 0.0);
        }
    }

    #[test]
    fn test_empty_input_flags_insufficient_data() {
        let report = analyze(&[], &AnalysisConfig::default());
        assert!(report.insufficient_data);
        assert!(report.records.is_empty());
        assert!(report.groups.is_empty());
    }
}
