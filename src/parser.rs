//! JSON adapter for the Seoul realtime-position payload.
//!
//! The upstream API wraps each poll in a `realtimePositionList` array whose
//! elements use the feed's own field names (`subwayId`, `statnNm`,
//! `trainSttus`, ...). Reconciling those names with the snapshot schema
//! happens here and nowhere else; the core never sees them.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::warn;

use crate::snapshot::{RawSnapshot, Snapshot};

#[derive(Debug, Deserialize)]
struct PositionPayload {
    #[serde(rename = "realtimePositionList")]
    positions: Option<Vec<ApiPosition>>,
    #[serde(rename = "errorMessage")]
    error_message: Option<ApiError>,
    #[serde(rename = "RESULT")]
    result: Option<ApiResult>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(rename = "CODE")]
    code: Option<String>,
    #[serde(rename = "MESSAGE")]
    message: Option<String>,
}

/// One element of `realtimePositionList`, field names as the feed sends them.
/// Everything is an optional string; the feed is not strict about types.
#[derive(Debug, Deserialize)]
pub struct ApiPosition {
    #[serde(rename = "subwayId")]
    pub subway_id: Option<String>,
    #[serde(rename = "subwayNm")]
    pub subway_name: Option<String>,
    #[serde(rename = "statnId")]
    pub station_id: Option<String>,
    #[serde(rename = "statnNm")]
    pub station_name: Option<String>,
    #[serde(rename = "trainNo")]
    pub train_no: Option<String>,
    #[serde(rename = "updnLine")]
    pub updn_line: Option<String>,
    #[serde(rename = "trainSttus")]
    pub train_status: Option<String>,
    #[serde(rename = "directAt")]
    pub is_express: Option<String>,
    #[serde(rename = "lstcarAt")]
    pub is_last_train: Option<String>,
    #[serde(rename = "statnTid")]
    pub terminal_station_id: Option<String>,
    #[serde(rename = "statnTnm")]
    pub terminal_station_name: Option<String>,
    #[serde(rename = "recptnDt")]
    pub received_at: Option<String>,
}

impl From<ApiPosition> for RawSnapshot {
    fn from(pos: ApiPosition) -> RawSnapshot {
        RawSnapshot {
            line_id: pos.subway_id,
            line_name: pos.subway_name,
            station_id: pos.station_id,
            station_name: pos.station_name,
            train_number: pos.train_no,
            direction: pos.updn_line,
            status: pos.train_status,
            is_express: pos.is_express,
            is_last_train: pos.is_last_train,
            destination_station_id: pos.terminal_station_id,
            destination_station_name: pos.terminal_station_name,
            observed_at: pos.received_at,
        }
    }
}

/// Decodes a realtime-position JSON payload into validated snapshots plus a
/// malformed-row count.
///
/// # Errors
///
/// Returns an error when the bytes are not valid JSON, or when the payload
/// carries an upstream error body instead of a position list. Individual bad
/// rows are skipped and counted, never fatal.
pub fn parse_positions(bytes: &[u8]) -> Result<(Vec<Snapshot>, usize)> {
    let payload: PositionPayload =
        serde_json::from_slice(bytes).context("payload is not a realtime-position document")?;

    let Some(positions) = payload.positions else {
        if let Some(err) = payload.error_message {
            bail!(
                "upstream error: {}",
                err.message.as_deref().unwrap_or("unknown")
            );
        }
        if let Some(result) = payload.result {
            bail!(
                "upstream error {}: {}",
                result.code.as_deref().unwrap_or("?"),
                result.message.as_deref().unwrap_or("unknown")
            );
        }
        bail!("payload has no realtimePositionList");
    };

    let total = positions.len();
    let snapshots: Vec<Snapshot> = positions
        .into_iter()
        .filter_map(|pos| RawSnapshot::from(pos).validate().ok())
        .collect();
    let malformed = total - snapshots.len();
    if malformed > 0 {
        warn!(malformed, total, "Skipped malformed position rows");
    }

    Ok((snapshots, malformed))
}
