// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Fixtures shared by the integration tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use voltgym_core::TimeSeriesStore;
use voltgym_types::{EnvConfig, MarketSignal, SignalKind};

/// Midnight of 2021-10-01 plus `hours`
pub fn hour(hours: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 10, 1, 0, 0, 0).unwrap() + Duration::hours(hours)
}

/// Load, price and MOER for every hour in `hours`
///
/// Load is constant, MOER cycles and price comes from `price`.
pub fn hourly_signals(
    region_id: &str,
    hours: impl IntoIterator<Item = i64>,
    price: impl Fn(i64) -> f64,
) -> Vec<MarketSignal> {
    hours
        .into_iter()
        .flat_map(|h| {
            [
                MarketSignal::new(region_id, hour(h), SignalKind::Load, 1500.0),
                MarketSignal::new(region_id, hour(h), SignalKind::Price, price(h)),
                MarketSignal::new(region_id, hour(h), SignalKind::Moer, 700.0 + (h % 24) as f64),
            ]
        })
        .collect()
}

/// Store with `days` of hourly data for one region
pub fn hourly_store(region_id: &str, days: i64, price: impl Fn(i64) -> f64) -> Arc<TimeSeriesStore> {
    let signals = hourly_signals(region_id, 0..days * 24, price);
    Arc::new(TimeSeriesStore::from_records(signals, Vec::new()).expect("valid fixture data"))
}

/// Hourly-step configuration splitting at `split_hour`, no staleness allowance
pub fn hourly_config(split_hour: i64, steps: usize) -> EnvConfig {
    let mut config = EnvConfig::new(hour(split_hour), hour(split_hour));
    config.episode.steps = steps;
    config.episode.step_minutes = 60;
    config.alignment.max_staleness_minutes = 0;
    config
}

/// Daily price shape: cheap nights, expensive evenings
pub fn daily_price(h: i64) -> f64 {
    match h % 24 {
        0..=5 => 20.0,
        17..=20 => 120.0,
        _ => 55.0,
    }
}
