//! Event reconstruction: turning noisy per-cycle snapshots into visits.
//!
//! The position feed is polled roughly once a minute, so a train sitting at a
//! station shows up as several near-identical rows, possibly duplicated and
//! out of order. This module collapses those rows into [`Visit`]s — one
//! contiguous stay of one train at one station in one direction — which every
//! analyzer downstream consumes read-only.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::snapshot::{Direction, Snapshot, TrainStatus};

/// A reconstructed contiguous stay of one train at one station/direction.
#[derive(Debug, Clone, Serialize)]
pub struct Visit {
    pub train_number: String,
    pub line_id: String,
    pub line_name: String,
    pub station_id: String,
    pub station_name: String,
    pub direction: Direction,
    pub is_express: bool,
    pub first_observed: DateTime<Utc>,
    /// Timestamp of the last row in the visit; stands in for departure time.
    pub last_observed: DateTime<Utc>,
    /// Earliest timestamp among rows with ENTERING or ARRIVED status.
    pub arrival_time: Option<DateTime<Utc>>,
    pub saw_entering: bool,
    pub saw_arrived: bool,
    pub sample_count: usize,
    /// False when the visit was still open at the end of the batch. Incomplete
    /// visits are excluded from dwell and turnaround but can seed the next
    /// batch via [`reconstruct_with_open`].
    pub complete: bool,
}

impl Visit {
    fn open(snap: &Snapshot) -> Visit {
        let mut visit = Visit {
            train_number: snap.train_number.clone(),
            line_id: snap.line_id.clone(),
            line_name: snap.line_name.clone(),
            station_id: snap.station_id.clone(),
            station_name: snap.station_name.clone(),
            direction: snap.direction,
            is_express: false,
            first_observed: snap.observed_at,
            last_observed: snap.observed_at,
            arrival_time: None,
            saw_entering: false,
            saw_arrived: false,
            sample_count: 0,
            complete: false,
        };
        visit.absorb(snap);
        visit
    }

    fn absorb(&mut self, snap: &Snapshot) {
        self.sample_count += 1;
        self.is_express |= snap.is_express;
        if snap.observed_at < self.first_observed {
            self.first_observed = snap.observed_at;
        }
        if snap.observed_at > self.last_observed {
            self.last_observed = snap.observed_at;
        }
        match snap.status {
            TrainStatus::Entering | TrainStatus::Arrived => {
                if snap.status == TrainStatus::Entering {
                    self.saw_entering = true;
                } else {
                    self.saw_arrived = true;
                }
                let candidate = snap.observed_at;
                self.arrival_time = Some(match self.arrival_time {
                    Some(existing) if existing <= candidate => existing,
                    _ => candidate,
                });
            }
            // Departed and unrecognized rows extend the visit (the train is
            // still physically observed there) but never set arrival_time.
            TrainStatus::Departed | TrainStatus::Unrecognized => {}
        }
    }

    fn matches(&self, snap: &Snapshot) -> bool {
        self.station_name == snap.station_name && self.direction == snap.direction
    }

    /// Departure minus arrival (or first observation when the visit never
    /// showed an ENTERING/ARRIVED row). A single-sample visit dwells 0 — the
    /// train passed between polling cycles, which is a real value, not
    /// missing data.
    pub fn dwell_sec(&self) -> f64 {
        let from = self.arrival_time.unwrap_or(self.first_observed);
        (self.last_observed - from).num_milliseconds() as f64 / 1000.0
    }

    /// Whether this visit counts as an arrival for headway purposes.
    /// ARRIVED is always authoritative; ENTERING only when the policy
    /// switch admits it.
    pub fn counts_as_arrival(&self, count_entering: bool) -> bool {
        self.saw_arrived || (count_entering && self.saw_entering)
    }
}

/// Output of the reconstructor: the visit sequence plus data-quality counts.
/// Quality problems degrade by exclusion and are reported here; they are
/// never errors.
#[derive(Debug, Serialize)]
pub struct Reconstruction {
    /// Visits grouped per train (trains in sorted order), time-ordered
    /// within each train.
    pub visits: Vec<Visit>,
    pub duplicate_rows: usize,
    pub unrecognized_status_rows: usize,
    pub trains_observed: usize,
}

/// Reconstructs visits from a finite batch of snapshots.
pub fn reconstruct(snapshots: &[Snapshot]) -> Reconstruction {
    reconstruct_with_open(snapshots, Vec::new())
}

/// Like [`reconstruct`], but resumes visits left open by a previous batch.
/// A carry-over visit is continued when the train's first rows still match
/// its (station, direction); otherwise it is closed as complete, since the
/// later batch proves the train moved on.
pub fn reconstruct_with_open(snapshots: &[Snapshot], carry_over: Vec<Visit>) -> Reconstruction {
    // Exact duplicate rows (same train, station, direction, timestamp, and
    // everything else) must contribute exactly once.
    let mut seen: HashSet<&Snapshot> = HashSet::with_capacity(snapshots.len());
    let mut duplicate_rows = 0;
    let mut unrecognized_status_rows = 0;

    let mut per_train: BTreeMap<&str, Vec<&Snapshot>> = BTreeMap::new();
    for snap in snapshots {
        if !seen.insert(snap) {
            duplicate_rows += 1;
            continue;
        }
        if snap.status == TrainStatus::Unrecognized {
            unrecognized_status_rows += 1;
        }
        per_train
            .entry(snap.train_number.as_str())
            .or_default()
            .push(snap);
    }

    let mut open_by_train: BTreeMap<String, Visit> = carry_over
        .into_iter()
        .map(|v| (v.train_number.clone(), v))
        .collect();

    let trains_observed = per_train.len();
    let mut visits = Vec::new();

    for (train, mut rows) in per_train {
        // Stable sort keeps original arrival order for duplicate timestamps,
        // so reconstruction is deterministic.
        rows.sort_by_key(|s| s.observed_at);

        let mut current = open_by_train.remove(train);
        for snap in rows {
            current = Some(match current.take() {
                Some(mut visit) if visit.matches(snap) => {
                    visit.absorb(snap);
                    visit
                }
                Some(mut closed) => {
                    closed.complete = true;
                    visits.push(closed);
                    Visit::open(snap)
                }
                None => Visit::open(snap),
            });
        }
        if let Some(open) = current {
            // Still open at batch end: retained but never a completed dwell.
            visits.push(open);
        }
    }

    // Carry-over visits for trains absent from this batch stay open.
    visits.extend(open_by_train.into_values());

    debug!(
        visits = visits.len(),
        duplicate_rows, unrecognized_status_rows, trains_observed, "Reconstruction finished"
    );

    Reconstruction {
        visits,
        duplicate_rows,
        unrecognized_status_rows,
        trains_observed,
    }
}

/// A train whose last observation is older than the staleness threshold,
/// relative to an explicit reference instant.
#[derive(Debug, Serialize)]
pub struct StaleTrain {
    pub train_number: String,
    pub line_name: String,
    pub last_observed: DateTime<Utc>,
    pub seconds_since_update: f64,
}

/// Lists trains unseen for longer than `stale_after_sec` as of `as_of`.
///
/// `as_of` is an explicit parameter rather than the process clock so the
/// check is reproducible over archived batches.
pub fn stale_trains(visits: &[Visit], as_of: DateTime<Utc>, stale_after_sec: f64) -> Vec<StaleTrain> {
    let mut last_seen: BTreeMap<&str, (&Visit, DateTime<Utc>)> = BTreeMap::new();
    for visit in visits {
        let entry = last_seen
            .entry(visit.train_number.as_str())
            .or_insert((visit, visit.last_observed));
        if visit.last_observed > entry.1 {
            *entry = (visit, visit.last_observed);
        }
    }

    last_seen
        .into_values()
        .filter_map(|(visit, last)| {
            let gap = (as_of - last).num_milliseconds() as f64 / 1000.0;
            (gap > stale_after_sec).then(|| StaleTrain {
                train_number: visit.train_number.clone(),
                line_name: visit.line_name.clone(),
                last_observed: last,
                seconds_since_update: gap,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_550_400 + secs, 0).unwrap()
    }

    fn snap(train: &str, station: &str, dir: Direction, status: &str, secs: i64) -> Snapshot {
        Snapshot {
            line_id: "1002".into(),
            line_name: "Line 2".into(),
            station_id: "211".into(),
            station_name: station.into(),
            train_number: train.into(),
            direction: dir,
            status: TrainStatus::from_code(status),
            is_express: false,
            is_last_train: false,
            destination_station_id: None,
            destination_station_name: None,
            observed_at: ts(secs),
        }
    }

    #[test]
    fn test_single_visit_entering_arrived_departed() {
        let rows = vec![
            snap("1234", "Seongsu", Direction::Up, "0", 0),
            snap("1234", "Seongsu", Direction::Up, "1", 10),
            snap("1234", "Seongsu", Direction::Up, "2", 70),
        ];
        let recon = reconstruct(&rows);
        assert_eq!(recon.visits.len(), 1);
        let visit = &recon.visits[0];
        assert_eq!(visit.arrival_time, Some(ts(0)));
        assert_eq!(visit.last_observed, ts(70));
        assert_eq!(visit.dwell_sec(), 70.0);
        assert_eq!(visit.sample_count, 3);
        assert!(!visit.complete);
    }

    #[test]
    fn test_station_change_closes_visit() {
        let rows = vec![
            snap("1234", "Seongsu", Direction::Up, "1", 0),
            snap("1234", "Seongsu", Direction::Up, "2", 60),
            snap("1234", "Konkuk Univ.", Direction::Up, "1", 180),
        ];
        let recon = reconstruct(&rows);
        assert_eq!(recon.visits.len(), 2);
        assert!(recon.visits[0].complete);
        assert_eq!(recon.visits[0].last_observed, ts(60));
        assert!(!recon.visits[1].complete);
        assert_eq!(recon.visits[1].station_name, "Konkuk Univ.");
    }

    #[test]
    fn test_direction_change_closes_visit_same_station() {
        let rows = vec![
            snap("1234", "Seongsu", Direction::Up, "1", 0),
            snap("1234", "Seongsu", Direction::Down, "1", 120),
        ];
        let recon = reconstruct(&rows);
        assert_eq!(recon.visits.len(), 2);
        assert!(recon.visits[0].complete);
        assert_eq!(recon.visits[1].direction, Direction::Down);
    }

    #[test]
    fn test_exact_duplicates_counted_once() {
        let row = snap("1234", "Seongsu", Direction::Up, "1", 0);
        let rows = vec![row.clone(), row.clone(), row];
        let recon = reconstruct(&rows);
        assert_eq!(recon.visits.len(), 1);
        assert_eq!(recon.visits[0].sample_count, 1);
        assert_eq!(recon.duplicate_rows, 2);
    }

    #[test]
    fn test_out_of_order_rows_sorted() {
        let rows = vec![
            snap("1234", "Seongsu", Direction::Up, "2", 70),
            snap("1234", "Seongsu", Direction::Up, "1", 0),
        ];
        let recon = reconstruct(&rows);
        assert_eq!(recon.visits[0].arrival_time, Some(ts(0)));
        assert_eq!(recon.visits[0].last_observed, ts(70));
    }

    #[test]
    fn test_unrecognized_status_extends_but_never_arrives() {
        let rows = vec![
            snap("1234", "Seongsu", Direction::Up, "7", 0),
            snap("1234", "Seongsu", Direction::Up, "7", 60),
        ];
        let recon = reconstruct(&rows);
        assert_eq!(recon.unrecognized_status_rows, 2);
        let visit = &recon.visits[0];
        assert_eq!(visit.arrival_time, None);
        assert_eq!(visit.sample_count, 2);
        assert_eq!(visit.dwell_sec(), 60.0);
        assert!(!visit.counts_as_arrival(true));
    }

    #[test]
    fn test_single_row_visit_dwells_zero() {
        let recon = reconstruct(&[snap("1234", "Seongsu", Direction::Up, "1", 0)]);
        assert_eq!(recon.visits[0].dwell_sec(), 0.0);
    }

    #[test]
    fn test_entering_only_visit_arrival_policy() {
        let recon = reconstruct(&[snap("1234", "Seongsu", Direction::Up, "0", 0)]);
        let visit = &recon.visits[0];
        assert!(!visit.counts_as_arrival(false));
        assert!(visit.counts_as_arrival(true));
    }

    #[test]
    fn test_carry_over_visit_resumes() {
        let first = reconstruct(&[
            snap("1234", "Seongsu", Direction::Up, "1", 0),
            snap("1234", "Seongsu", Direction::Up, "1", 60),
        ]);
        let open: Vec<Visit> = first.visits.into_iter().filter(|v| !v.complete).collect();
        assert_eq!(open.len(), 1);

        let second = reconstruct_with_open(
            &[
                snap("1234", "Seongsu", Direction::Up, "2", 120),
                snap("1234", "Konkuk Univ.", Direction::Up, "1", 240),
            ],
            open,
        );
        assert_eq!(second.visits.len(), 2);
        let resumed = &second.visits[0];
        assert_eq!(resumed.station_name, "Seongsu");
        assert_eq!(resumed.arrival_time, Some(ts(0)));
        assert_eq!(resumed.last_observed, ts(120));
        assert_eq!(resumed.sample_count, 3);
        assert!(resumed.complete);
    }

    #[test]
    fn test_carry_over_train_absent_stays_open() {
        let open = reconstruct(&[snap("1234", "Seongsu", Direction::Up, "1", 0)]).visits;
        let second = reconstruct_with_open(&[snap("5678", "Seongsu", Direction::Up, "1", 60)], open);
        assert_eq!(second.visits.len(), 2);
        let carried = second
            .visits
            .iter()
            .find(|v| v.train_number == "1234")
            .unwrap();
        assert!(!carried.complete);
    }

    #[test]
    fn test_empty_batch() {
        let recon = reconstruct(&[]);
        assert!(recon.visits.is_empty());
        assert_eq!(recon.trains_observed, 0);
    }

    #[test]
    fn test_stale_trains_relative_to_as_of() {
        let recon = reconstruct(&[
            snap("1234", "Seongsu", Direction::Up, "1", 0),
            snap("5678", "Seongsu", Direction::Down, "1", 400),
        ]);
        let stale = stale_trains(&recon.visits, ts(500), 300.0);
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].train_number, "1234");
        assert_eq!(stale[0].seconds_since_update, 500.0);

        // Same data, earlier reference instant: nothing is stale.
        assert!(stale_trains(&recon.visits, ts(200), 300.0).is_empty());
    }
}
