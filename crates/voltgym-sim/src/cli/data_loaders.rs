// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Data loaders turning the various sources into a signal store.

use anyhow::{Context, Result, bail};
use chrono::{TimeZone, Utc};
use std::path::Path;
use tracing::info;
use voltgym_core::{SignalArchive, TimeSeriesStore, load_forecasts, load_signals};
use voltgym_types::SignalKind;

use crate::cli::args::DataSourceArgs;
use crate::scenarios::{self, MarketScenario, SyntheticSpec};

/// Trait for loading market data from various sources
pub trait DataLoader {
    fn load(&self) -> Result<TimeSeriesStore>;

    /// Human-readable name of the source
    fn describe(&self) -> String;
}

/// Loader for synthetic data using built-in scenarios
#[derive(Debug)]
pub struct SyntheticLoader {
    pub scenario: MarketScenario,
    pub spec: SyntheticSpec,
}

impl DataLoader for SyntheticLoader {
    fn load(&self) -> Result<TimeSeriesStore> {
        let market = self.scenario.generate(&self.spec);
        TimeSeriesStore::from_records(market.signals, market.forecasts)
            .context("Synthetic data failed validation")
    }

    fn describe(&self) -> String {
        format!("{} ({} days, seed {})", self.scenario.name(), self.spec.days, self.spec.seed)
    }
}

/// Loader for CSV exports
#[derive(Debug)]
pub struct CsvLoader {
    signals_path: String,
    forecasts_path: Option<String>,
    forecast_kind: Option<SignalKind>,
}

impl CsvLoader {
    pub fn new(
        signals_path: String,
        forecasts_path: Option<String>,
        forecast_kind: Option<SignalKind>,
    ) -> Self {
        Self {
            signals_path,
            forecasts_path,
            forecast_kind,
        }
    }
}

impl DataLoader for CsvLoader {
    fn load(&self) -> Result<TimeSeriesStore> {
        let signals = load_signals(Path::new(&self.signals_path))
            .with_context(|| format!("Failed to ingest signals from {}", self.signals_path))?;
        let forecasts = match &self.forecasts_path {
            Some(path) => load_forecasts(Path::new(path), self.forecast_kind)
                .with_context(|| format!("Failed to ingest forecasts from {path}"))?,
            None => Vec::new(),
        };
        Ok(TimeSeriesStore::from_records(signals, forecasts)?)
    }

    fn describe(&self) -> String {
        match &self.forecasts_path {
            Some(forecasts) => format!("CSV {} + {}", self.signals_path, forecasts),
            None => format!("CSV {}", self.signals_path),
        }
    }
}

/// Loader for a SQLite signal archive
#[derive(Debug)]
pub struct ArchiveLoader {
    db_path: String,
}

impl ArchiveLoader {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }
}

impl DataLoader for ArchiveLoader {
    fn load(&self) -> Result<TimeSeriesStore> {
        SignalArchive::new(&self.db_path)
            .load()
            .with_context(|| format!("Failed to load archive {}", self.db_path))
    }

    fn describe(&self) -> String {
        format!("Archive {}", self.db_path)
    }
}

/// Pick the loader selected by the command-line flags
pub fn loader_from_args(args: &DataSourceArgs) -> Result<Box<dyn DataLoader>> {
    if args.signals.is_some() && args.from_db.is_some() {
        bail!("--signals and --from-db are mutually exclusive");
    }
    if let Some(path) = &args.from_db {
        return Ok(Box::new(ArchiveLoader::new(path.clone())));
    }
    if let Some(path) = &args.signals {
        let forecast_kind = args
            .forecast_kind
            .as_deref()
            .map(str::parse::<SignalKind>)
            .transpose()
            .map_err(|e| anyhow::anyhow!(e))?;
        return Ok(Box::new(CsvLoader::new(
            path.clone(),
            args.forecasts.clone(),
            forecast_kind,
        )));
    }

    let preset = scenarios::preset(&args.scenario).with_context(|| {
        let available: Vec<&str> = scenarios::SCENARIO_PRESETS.iter().map(|p| p.id).collect();
        format!(
            "Unknown scenario '{}' (available: {})",
            args.scenario,
            available.join(", ")
        )
    })?;
    let start = Utc
        .with_ymd_and_hms(2021, 10, 1, 0, 0, 0)
        .single()
        .context("Invalid synthetic start date")?;
    Ok(Box::new(SyntheticLoader {
        scenario: preset.scenario,
        spec: SyntheticSpec {
            region_id: args.region.clone(),
            start,
            days: args.days,
            step_minutes: 5,
            seed: args.data_seed,
            forecast_noise: 0.1,
        },
    }))
}

/// Load the store and archive it when `--save-db` is given
pub fn load_store(args: &DataSourceArgs) -> Result<TimeSeriesStore> {
    let loader = loader_from_args(args)?;
    let store = loader.load()?;
    info!(
        "Loaded {}: {} regions, {} signals, {} forecast points",
        loader.describe(),
        store.regions().len(),
        store.signal_count(),
        store.forecast_point_count()
    );
    if store.is_empty() {
        bail!("{} holds no signals", loader.describe());
    }

    if let Some(path) = &args.save_db {
        SignalArchive::new(path)
            .save(&store)
            .with_context(|| format!("Failed to archive data to {path}"))?;
        info!("Archived data to {}", path);
    }
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        source: DataSourceArgs,
    }

    fn args(flags: &[&str]) -> DataSourceArgs {
        let mut argv = vec!["test"];
        argv.extend_from_slice(flags);
        Wrapper::parse_from(argv).source
    }

    #[test]
    fn test_synthetic_by_default() {
        let store = load_store(&args(&["--days", "2", "--region", "SDGE"])).unwrap();
        assert_eq!(store.regions(), vec!["SDGE".to_owned()]);
        assert_eq!(store.signal_count(), 2 * 288 * 3);
    }

    #[test]
    fn test_unknown_scenario() {
        let err = loader_from_args(&args(&["--scenario", "storm"])).err().unwrap();
        assert!(err.to_string().contains("usual_day"));
    }

    #[test]
    fn test_csv_and_archive_round_trip() {
        let dir = TempDir::new().unwrap();
        let signals = dir.path().join("signals.csv");
        fs::write(
            &signals,
            "region_id,timestamp,kind,value\n\
             SDGE,2021-10-01 00:00:00,price,41.5\n\
             SDGE,2021-10-01 00:05:00,price,42.5\n",
        )
        .unwrap();
        let db = dir.path().join("archive.db");

        let from_csv = load_store(&args(&[
            "--signals",
            signals.to_str().unwrap(),
            "--save-db",
            db.to_str().unwrap(),
        ]))
        .unwrap();
        let from_db = load_store(&args(&["--from-db", db.to_str().unwrap()])).unwrap();

        assert_eq!(from_csv.signal_count(), 2);
        assert_eq!(
            from_db.series("SDGE", SignalKind::Price),
            from_csv.series("SDGE", SignalKind::Price)
        );
    }

    #[test]
    fn test_conflicting_sources() {
        assert!(loader_from_args(&args(&["--signals", "a.csv", "--from-db", "b.db"])).is_err());
    }
}
