//! Snapshot records and their validation.
//!
//! A [`Snapshot`] is one polled observation of one train at one instant. Raw
//! rows arrive as loosely-typed strings (CSV export or API payload); the
//! [`RawSnapshot`] → [`Snapshot`] validation step is where malformed rows are
//! weeded out and counted, never turned into errors.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Train status codes as reported by the position feed.
///
/// Codes outside 0/1/2 show up occasionally (test trains, depot moves); they
/// are kept as [`TrainStatus::Unrecognized`] so the row still counts toward a
/// visit's sample count, but they never establish an arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    Entering,
    Arrived,
    Departed,
    Unrecognized,
}

impl TrainStatus {
    /// Maps a raw feed code to a status. `"0"` entering, `"1"` arrived,
    /// `"2"` departed; anything else is unrecognized.
    pub fn from_code(code: &str) -> TrainStatus {
        match code.trim() {
            "0" => TrainStatus::Entering,
            "1" => TrainStatus::Arrived,
            "2" => TrainStatus::Departed,
            _ => TrainStatus::Unrecognized,
        }
    }
}

/// Travel direction: `0` up/inner loop, `1` down/outer loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn from_code(code: &str) -> Option<Direction> {
        match code.trim() {
            "0" => Some(Direction::Up),
            "1" => Some(Direction::Down),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Up => "up/inner",
            Direction::Down => "down/outer",
        }
    }
}

/// One validated polled observation of one train.
///
/// `train_number` is a session key scoped to the analysis window, not a
/// permanent vehicle identity; the same number can reappear on a later day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    pub line_id: String,
    pub line_name: String,
    pub station_id: String,
    pub station_name: String,
    pub train_number: String,
    pub direction: Direction,
    pub status: TrainStatus,
    pub is_express: bool,
    pub is_last_train: bool,
    pub destination_station_id: Option<String>,
    pub destination_station_name: Option<String>,
    pub observed_at: DateTime<Utc>,
}

/// A snapshot row as it appears in a collector CSV export, before validation.
/// Every field is optional so one bad row never aborts the batch.
#[derive(Debug, Default, Deserialize)]
pub struct RawSnapshot {
    pub line_id: Option<String>,
    pub line_name: Option<String>,
    pub station_id: Option<String>,
    pub station_name: Option<String>,
    pub train_number: Option<String>,
    pub direction: Option<String>,
    pub status: Option<String>,
    pub is_express: Option<String>,
    pub is_last_train: Option<String>,
    pub destination_station_id: Option<String>,
    pub destination_station_name: Option<String>,
    pub observed_at: Option<String>,
}

/// Why a raw row was rejected during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingTrainNumber,
    MissingStationName,
    MissingTimestamp,
    BadTimestamp,
    BadDirection,
}

impl RawSnapshot {
    /// Validates the raw row into a [`Snapshot`], or reports why it can't be.
    ///
    /// Only `train_number`, `station_name`, `observed_at`, and a parseable
    /// direction are required; everything else falls back to empty values.
    pub fn validate(self) -> std::result::Result<Snapshot, RejectReason> {
        let train_number = match non_empty(self.train_number) {
            Some(t) => t,
            None => return Err(RejectReason::MissingTrainNumber),
        };
        let station_name = match non_empty(self.station_name) {
            Some(s) => s,
            None => return Err(RejectReason::MissingStationName),
        };
        let raw_ts = match non_empty(self.observed_at) {
            Some(ts) => ts,
            None => return Err(RejectReason::MissingTimestamp),
        };
        let observed_at = parse_timestamp(&raw_ts).map_err(|_| RejectReason::BadTimestamp)?;

        let direction = self
            .direction
            .as_deref()
            .and_then(Direction::from_code)
            .ok_or(RejectReason::BadDirection)?;

        let status = self
            .status
            .as_deref()
            .map(TrainStatus::from_code)
            .unwrap_or(TrainStatus::Unrecognized);

        Ok(Snapshot {
            line_id: self.line_id.unwrap_or_default(),
            line_name: self.line_name.unwrap_or_default(),
            station_id: self.station_id.unwrap_or_default(),
            station_name,
            train_number,
            direction,
            status,
            is_express: parse_flag(self.is_express.as_deref()),
            is_last_train: parse_flag(self.is_last_train.as_deref()),
            destination_station_id: non_empty(self.destination_station_id),
            destination_station_name: non_empty(self.destination_station_name),
            observed_at,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// The upstream feed encodes booleans as `"1"`/`"0"`; exports sometimes carry
/// `"true"`/`"false"` instead. Both spellings are accepted.
pub fn parse_flag(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    )
}

/// Parses a timestamp in either RFC 3339 or the collector's naive
/// `YYYY-MM-DD HH:MM:SS` format (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    bail!("unparseable timestamp: {raw:?}");
}
