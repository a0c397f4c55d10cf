// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Environment configuration from a file and command-line overrides.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use voltgym_core::{TimeSeriesStore, load_config, parse_timestamp};
use voltgym_types::{EnvConfig, ForecastMode};

use crate::cli::args::EnvArgs;

/// Share of the data coverage used for training when no split is given
const DEFAULT_TRAIN_FRACTION: f64 = 0.7;

/// Build and validate the environment configuration
///
/// Flags override the configuration file. Without a file or explicit
/// boundaries the split is placed at 70% of the store's coverage, with no
/// embargo between the pools.
pub fn build_env_config(args: &EnvArgs, store: &TimeSeriesStore) -> Result<EnvConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(Path::new(path))
            .with_context(|| format!("Failed to load environment config {path}"))?,
        None => {
            let boundary = default_boundary(store)?;
            EnvConfig::new(boundary, boundary)
        }
    };

    if let Some(raw) = &args.train_end {
        config.split.train_end = timestamp_arg("--train-end", raw)?;
    }
    if let Some(raw) = &args.test_start {
        config.split.test_start = timestamp_arg("--test-start", raw)?;
    }
    if let Some(steps) = args.steps {
        config.episode.steps = steps;
    }
    if let Some(minutes) = args.step_minutes {
        config.episode.step_minutes = minutes;
    }
    if let Some(capacity) = args.capacity {
        config.battery.capacity_kwh = capacity;
    }
    if let Some(mode) = &args.forecast {
        config.forecast.mode = match mode.as_str() {
            "oracle" => ForecastMode::Oracle,
            "issued" => ForecastMode::Issued,
            _ => ForecastMode::None,
        };
    }

    config.validate()?;
    Ok(config)
}

fn timestamp_arg(flag: &str, raw: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).with_context(|| format!("Invalid {flag} timestamp '{raw}'"))
}

/// Instant at `DEFAULT_TRAIN_FRACTION` of the union of all region coverages
fn default_boundary(store: &TimeSeriesStore) -> Result<DateTime<Utc>> {
    let (start, end) = store
        .regions()
        .iter()
        .filter_map(|region| store.coverage(region))
        .reduce(|(a_start, a_end), (b_start, b_end)| (a_start.min(b_start), a_end.max(b_end)))
        .context("No region has load, price and moer coverage")?;

    let span = (end - start).num_seconds() as f64;
    let offset = Duration::seconds((span * DEFAULT_TRAIN_FRACTION) as i64);
    Ok(start + offset)
}
