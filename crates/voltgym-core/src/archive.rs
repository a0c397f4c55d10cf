// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! SQLite persistence of a normalized store.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use rusqlite::{Connection, params};
use tracing::info;
use voltgym_types::{ForecastRecord, MarketSignal, SignalKind};

use crate::error::{IngestionError, Result};
use crate::store::TimeSeriesStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS signals (
    region_id TEXT NOT NULL,
    ts INTEGER NOT NULL,
    kind TEXT NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (region_id, kind, ts)
);
CREATE TABLE IF NOT EXISTS forecasts (
    region_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    issued_at INTEGER NOT NULL,
    horizon_offset INTEGER NOT NULL,
    value REAL NOT NULL,
    PRIMARY KEY (region_id, kind, issued_at, horizon_offset)
);
";

/// Archive of ingested signals and forecasts in a SQLite file
///
/// Timestamps are stored as epoch seconds.
#[derive(Debug, Clone)]
pub struct SignalArchive {
    db_path: PathBuf,
}

impl SignalArchive {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Replace the archive contents with `store`
    pub fn save(&self, store: &TimeSeriesStore) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM signals", [])?;
        tx.execute("DELETE FROM forecasts", [])?;
        {
            let mut insert_signal = tx.prepare(
                "INSERT INTO signals (region_id, ts, kind, value) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for signal in store.signals() {
                insert_signal.execute(params![
                    signal.region_id,
                    signal.timestamp.timestamp(),
                    signal.kind.as_str(),
                    signal.value
                ])?;
            }

            let mut insert_forecast = tx.prepare(
                "INSERT INTO forecasts (region_id, kind, issued_at, horizon_offset, value)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for record in store.forecast_records() {
                insert_forecast.execute(params![
                    record.region_id,
                    record.kind.as_str(),
                    record.issued_at.timestamp(),
                    record.horizon_offset_secs,
                    record.value
                ])?;
            }
        }
        tx.commit()?;

        info!(
            "Archived {} signals and {} forecast points to {}",
            store.signal_count(),
            store.forecast_point_count(),
            self.db_path.display()
        );
        Ok(())
    }

    /// Rebuild a store from the archive
    pub fn load(&self) -> Result<TimeSeriesStore> {
        let conn = self.connect()?;

        let mut stmt = conn.prepare(
            "SELECT region_id, ts, kind, value FROM signals ORDER BY region_id, kind, ts",
        )?;
        let raw_signals: Vec<(String, i64, String, f64)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut signals = Vec::with_capacity(raw_signals.len());
        for (idx, (region_id, ts, kind, value)) in raw_signals.into_iter().enumerate() {
            let row = idx + 1;
            signals.push(MarketSignal {
                region_id,
                timestamp: epoch(ts, row)?,
                kind: parse_kind(&kind, row)?,
                value,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT region_id, kind, issued_at, horizon_offset, value FROM forecasts
             ORDER BY region_id, kind, issued_at, horizon_offset",
        )?;
        let raw_forecasts: Vec<(String, String, i64, i64, f64)> = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut forecasts = Vec::with_capacity(raw_forecasts.len());
        for (idx, (region_id, kind, issued_at, offset, value)) in raw_forecasts.into_iter().enumerate() {
            let row = idx + 1;
            forecasts.push(ForecastRecord {
                region_id,
                kind: parse_kind(&kind, row)?,
                issued_at: epoch(issued_at, row)?,
                horizon_offset_secs: offset,
                value,
            });
        }

        info!("Loading archive {}", self.db_path.display());
        Ok(TimeSeriesStore::from_records(signals, forecasts)?)
    }
}

fn epoch(secs: i64, row: usize) -> std::result::Result<chrono::DateTime<Utc>, IngestionError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| IngestionError::MalformedRow {
            row,
            reason: format!("timestamp {secs} out of range"),
        })
}

fn parse_kind(raw: &str, row: usize) -> std::result::Result<SignalKind, IngestionError> {
    raw.parse()
        .map_err(|reason| IngestionError::MalformedRow { row, reason })
}
