// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! CSV readers for the normalized signal and forecast schemas.
//!
//! Signals: `region_id, timestamp, kind, value`.
//! Forecasts: `region_id, issuance_timestamp, horizon_offset, value` with an
//! optional `kind` column. Column order is free; names are matched
//! case-insensitively.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;
use voltgym_types::{ForecastRecord, MarketSignal, SignalKind};

use crate::error::IngestionError;

/// Parse a timestamp in RFC 3339, `YYYY-MM-DD HH:MM[:SS][offset]` or epoch seconds
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return Utc.timestamp_opt(secs, 0).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

struct Columns {
    headers: Vec<String>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        Self {
            headers: headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
        }
    }

    fn find(&self, names: &[&str]) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| names.iter().any(|name| h == name))
    }

    fn require(&self, names: &[&str]) -> Result<usize, IngestionError> {
        self.find(names)
            .ok_or_else(|| IngestionError::MissingColumn(names[0].to_owned()))
    }
}

fn field<'r>(
    record: &'r StringRecord,
    idx: usize,
    name: &str,
    row: usize,
) -> Result<&'r str, IngestionError> {
    match record.get(idx).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(IngestionError::MalformedRow {
            row,
            reason: format!("missing value for '{name}'"),
        }),
    }
}

fn timestamp_field(
    record: &StringRecord,
    idx: usize,
    name: &str,
    row: usize,
) -> Result<DateTime<Utc>, IngestionError> {
    let raw = field(record, idx, name, row)?;
    parse_timestamp(raw).ok_or_else(|| IngestionError::MalformedRow {
        row,
        reason: format!("unparseable {name} '{raw}'"),
    })
}

fn number_field<T: std::str::FromStr>(
    record: &StringRecord,
    idx: usize,
    name: &str,
    row: usize,
) -> Result<T, IngestionError> {
    let raw = field(record, idx, name, row)?;
    raw.parse::<T>().map_err(|_| IngestionError::MalformedRow {
        row,
        reason: format!("invalid {name} '{raw}'"),
    })
}

fn kind_field(record: &StringRecord, idx: usize, row: usize) -> Result<SignalKind, IngestionError> {
    field(record, idx, "kind", row)?
        .parse::<SignalKind>()
        .map_err(|reason| IngestionError::MalformedRow { row, reason })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader)
}

/// Read state-like signals from CSV
pub fn read_signals<R: Read>(reader: R) -> Result<Vec<MarketSignal>, IngestionError> {
    let mut reader = csv_reader(reader);
    let columns = Columns::new(reader.headers()?);
    let region_col = columns.require(&["region_id", "region"])?;
    let ts_col = columns.require(&["timestamp", "interval_start"])?;
    let kind_col = columns.require(&["kind"])?;
    let value_col = columns.require(&["value"])?;

    let mut signals = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = record.map_err(|e| IngestionError::MalformedRow {
            row,
            reason: e.to_string(),
        })?;
        signals.push(MarketSignal {
            region_id: field(&record, region_col, "region_id", row)?.to_owned(),
            timestamp: timestamp_field(&record, ts_col, "timestamp", row)?,
            kind: kind_field(&record, kind_col, row)?,
            value: number_field(&record, value_col, "value", row)?,
        });
    }
    Ok(signals)
}

/// Read forecast points from CSV
///
/// Rows without a `kind` column take `default_kind`; a file with neither is
/// rejected.
pub fn read_forecasts<R: Read>(
    reader: R,
    default_kind: Option<SignalKind>,
) -> Result<Vec<ForecastRecord>, IngestionError> {
    let mut reader = csv_reader(reader);
    let columns = Columns::new(reader.headers()?);
    let region_col = columns.require(&["region_id", "region"])?;
    let issued_col = columns.require(&["issuance_timestamp", "issued_at"])?;
    let offset_col = columns.require(&["horizon_offset", "horizon_offset_secs"])?;
    let value_col = columns.require(&["value"])?;
    let kind_col = columns.find(&["kind"]);
    if kind_col.is_none() && default_kind.is_none() {
        return Err(IngestionError::MissingColumn("kind".to_owned()));
    }

    let mut records = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let row = idx + 1;
        let record = record.map_err(|e| IngestionError::MalformedRow {
            row,
            reason: e.to_string(),
        })?;
        let kind = match kind_col {
            Some(col) => kind_field(&record, col, row)?,
            None => default_kind.ok_or_else(|| IngestionError::MissingColumn("kind".to_owned()))?,
        };
        records.push(ForecastRecord {
            region_id: field(&record, region_col, "region_id", row)?.to_owned(),
            kind,
            issued_at: timestamp_field(&record, issued_col, "issuance_timestamp", row)?,
            horizon_offset_secs: number_field(&record, offset_col, "horizon_offset", row)?,
            value: number_field(&record, value_col, "value", row)?,
        });
    }
    Ok(records)
}

fn open(path: &Path) -> Result<File, IngestionError> {
    File::open(path).map_err(|source| IngestionError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_signals(path: &Path) -> Result<Vec<MarketSignal>, IngestionError> {
    let signals = read_signals(open(path)?)?;
    info!("Read {} signals from {}", signals.len(), path.display());
    Ok(signals)
}

pub fn load_forecasts(
    path: &Path,
    default_kind: Option<SignalKind>,
) -> Result<Vec<ForecastRecord>, IngestionError> {
    let records = read_forecasts(open(path)?, default_kind)?;
    info!("Read {} forecast points from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2021, 10, 1, 8, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2021-10-01T08:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2021-10-01T01:00:00-07:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-10-01 01:00:00-07:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-10-01 08:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2021-10-01 08:00"), Some(expected));
        assert_eq!(parse_timestamp("1633075200"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_read_signals() {
        let data = "\
region_id,timestamp,kind,value
SDGE,2021-10-01T00:00:00Z,price,42.5
SDGE,1633046700,load,2100
";
        let signals = read_signals(data.as_bytes()).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].kind, SignalKind::Price);
        assert_eq!(signals[0].value, 42.5);
        assert_eq!(signals[1].kind, SignalKind::Load);
    }

    #[test]
    fn test_columns_in_any_order() {
        let data = "value,kind,Region_ID,Timestamp\n900,moer,SDGE,2021-10-01 00:00:00\n";
        let signals = read_signals(data.as_bytes()).unwrap();
        assert_eq!(signals[0].kind, SignalKind::Moer);
        assert_eq!(signals[0].region_id, "SDGE");
    }

    #[test]
    fn test_malformed_timestamp_reports_row() {
        let data = "\
region_id,timestamp,kind,value
SDGE,2021-10-01T00:00:00Z,price,42.5
SDGE,2021-10-01T00:05:00Z,price,43.0
SDGE,not-a-time,price,44.0
";
        let err = read_signals(data.as_bytes()).unwrap_err();
        match err {
            IngestionError::MalformedRow { row, reason } => {
                assert_eq!(row, 3);
                assert!(reason.contains("not-a-time"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column_rejected() {
        let data = "region_id,timestamp,value\nSDGE,2021-10-01T00:00:00Z,1\n";
        let err = read_signals(data.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestionError::MissingColumn(ref c) if c == "kind"));
    }

    #[test]
    fn test_missing_value_rejected() {
        let data = "region_id,timestamp,kind,value\nSDGE,2021-10-01T00:00:00Z,price,\n";
        let err = read_signals(data.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestionError::MalformedRow { row: 1, .. }));
    }

    #[test]
    fn test_read_forecasts_with_default_kind() {
        let data = "\
region_id,issuance_timestamp,horizon_offset,value
SDGE,2021-10-01T00:00:00Z,3600,1500
SDGE,2021-10-01T00:00:00Z,7200,1600
";
        let records = read_forecasts(data.as_bytes(), Some(SignalKind::LoadForecast)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].horizon_offset_secs, 7200);
        assert_eq!(records[1].kind, SignalKind::LoadForecast);

        assert!(matches!(
            read_forecasts(data.as_bytes(), None),
            Err(IngestionError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_read_forecasts_kind_column_wins() {
        let data = "\
region_id,issuance_timestamp,horizon_offset,value,kind
SDGE,2021-10-01T00:00:00Z,3600,120,wind_forecast
";
        let records = read_forecasts(data.as_bytes(), Some(SignalKind::LoadForecast)).unwrap();
        assert_eq!(records[0].kind, SignalKind::WindForecast);
    }
}
