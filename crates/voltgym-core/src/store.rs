// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Normalized per-region time series.
//!
//! Records enter through a [`StoreBuilder`] one batch at a time. A batch is
//! validated as a whole before any of it is accepted, so a rejected file
//! leaves the builder exactly as it was. [`StoreBuilder::build`] freezes the
//! data into a [`TimeSeriesStore`], which is read-only and can be shared
//! between threads without locking.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use voltgym_types::{ForecastRecord, MarketSignal, SignalKind};

use crate::error::IngestionError;

type SeriesKey = (String, SignalKind);

/// One forecast vector published at `issued_at`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastIssue {
    pub issued_at: DateTime<Utc>,
    /// `(target_time, value)` sorted by target time
    pub points: Vec<(DateTime<Utc>, f64)>,
}

impl ForecastIssue {
    pub fn first_target(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|(t, _)| *t)
    }

    pub fn last_target(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|(t, _)| *t)
    }

    /// Value in effect at `at`: the latest point targeting at or before it
    ///
    /// Hourly issues therefore answer every sub-hourly step within the hour.
    pub fn value_at(&self, at: DateTime<Utc>) -> Option<f64> {
        let idx = self.points.partition_point(|(t, _)| *t <= at);
        idx.checked_sub(1).map(|i| self.points[i].1)
    }

    pub fn covers(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        matches!(
            (self.first_target(), self.last_target()),
            (Some(first), Some(last)) if first <= from && last >= to
        )
    }
}

/// Immutable store of ingested signals and forecast issues
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    series: BTreeMap<SeriesKey, Vec<(DateTime<Utc>, f64)>>,
    forecasts: BTreeMap<SeriesKey, Vec<ForecastIssue>>,
}

impl TimeSeriesStore {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    /// Build a store from complete record sets in one go
    pub fn from_records(
        signals: Vec<MarketSignal>,
        forecasts: Vec<ForecastRecord>,
    ) -> Result<Self, IngestionError> {
        let mut builder = StoreBuilder::default();
        builder.add_signals(signals)?;
        builder.add_forecasts(forecasts)?;
        Ok(builder.build())
    }

    /// All regions with at least one signal or forecast
    pub fn regions(&self) -> Vec<String> {
        self.series
            .keys()
            .chain(self.forecasts.keys())
            .map(|(region, _)| region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_region(&self, region_id: &str) -> bool {
        self.series.keys().any(|(region, _)| region == region_id)
            || self.forecasts.keys().any(|(region, _)| region == region_id)
    }

    /// Observations of a state-like series ordered by timestamp
    pub fn series(&self, region_id: &str, kind: SignalKind) -> &[(DateTime<Utc>, f64)] {
        self.series
            .get(&(region_id.to_owned(), kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Latest observation at or before `at`
    pub fn latest_at(
        &self,
        region_id: &str,
        kind: SignalKind,
        at: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, f64)> {
        let series = self.series(region_id, kind);
        let idx = series.partition_point(|(t, _)| *t <= at);
        idx.checked_sub(1).map(|i| series[i])
    }

    /// Latest observation at or before `at` that is no older than `max_staleness`
    pub fn carried_forward(
        &self,
        region_id: &str,
        kind: SignalKind,
        at: DateTime<Utc>,
        max_staleness: Duration,
    ) -> Option<f64> {
        self.latest_at(region_id, kind, at)
            .filter(|(t, _)| at - *t <= max_staleness)
            .map(|(_, value)| value)
    }

    /// Forecast issues of a kind ordered by issue time
    pub fn issues(&self, region_id: &str, kind: SignalKind) -> &[ForecastIssue] {
        self.forecasts
            .get(&(region_id.to_owned(), kind))
            .map_or(&[], Vec::as_slice)
    }

    /// Issues published at or before `at`, oldest first
    pub fn issues_until(
        &self,
        region_id: &str,
        kind: SignalKind,
        at: DateTime<Utc>,
    ) -> &[ForecastIssue] {
        let issues = self.issues(region_id, kind);
        let idx = issues.partition_point(|issue| issue.issued_at <= at);
        &issues[..idx]
    }

    /// Time range spanned by the state-like series of a region
    pub fn coverage(&self, region_id: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        SignalKind::STATE_KINDS
            .iter()
            .filter_map(|kind| {
                let series = self.series(region_id, *kind);
                Some((series.first()?.0, series.last()?.0))
            })
            .reduce(|(lo, hi), (first, last)| (lo.min(first), hi.max(last)))
    }

    pub fn signal_count(&self) -> usize {
        self.series.values().map(Vec::len).sum()
    }

    pub fn forecast_point_count(&self) -> usize {
        self.forecasts
            .values()
            .flat_map(|issues| issues.iter().map(|issue| issue.points.len()))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty() && self.forecasts.is_empty()
    }

    /// Every stored signal, grouped by series
    pub fn signals(&self) -> impl Iterator<Item = MarketSignal> + '_ {
        self.series.iter().flat_map(|((region, kind), points)| {
            points
                .iter()
                .map(move |(t, value)| MarketSignal::new(region.clone(), *t, *kind, *value))
        })
    }

    /// Every stored forecast point as a flat record
    pub fn forecast_records(&self) -> impl Iterator<Item = ForecastRecord> + '_ {
        self.forecasts.iter().flat_map(|((region, kind), issues)| {
            issues.iter().flat_map(move |issue| {
                issue.points.iter().map(move |(target, value)| ForecastRecord {
                    region_id: region.clone(),
                    kind: *kind,
                    issued_at: issue.issued_at,
                    horizon_offset_secs: (*target - issue.issued_at).num_seconds(),
                    value: *value,
                })
            })
        })
    }
}

/// Accumulates validated batches of records
#[derive(Debug, Default)]
pub struct StoreBuilder {
    series: BTreeMap<SeriesKey, Vec<(DateTime<Utc>, f64)>>,
    signal_keys: HashSet<(String, SignalKind, DateTime<Utc>)>,
    forecasts: BTreeMap<SeriesKey, BTreeMap<DateTime<Utc>, Vec<(DateTime<Utc>, f64)>>>,
    forecast_keys: HashSet<(String, SignalKind, DateTime<Utc>, i64)>,
}

impl StoreBuilder {
    /// Add a batch of state-like signals; rejected batches leave no trace
    ///
    /// Errors report the 1-based position of the offending record.
    pub fn add_signals(&mut self, batch: Vec<MarketSignal>) -> Result<&mut Self, IngestionError> {
        let mut batch_keys = HashSet::with_capacity(batch.len());
        for (idx, signal) in batch.iter().enumerate() {
            let row = idx + 1;
            if signal.region_id.trim().is_empty() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: "empty region_id".to_owned(),
                });
            }
            if signal.kind.is_forecast() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!(
                        "{} is a forecast series and must be ingested as forecast records",
                        signal.kind
                    ),
                });
            }
            if !signal.value.is_finite() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!("non-finite value {}", signal.value),
                });
            }
            let key = (signal.region_id.clone(), signal.kind, signal.timestamp);
            if self.signal_keys.contains(&key) || !batch_keys.insert(key) {
                return Err(IngestionError::Duplicate {
                    row,
                    region_id: signal.region_id.clone(),
                    kind: signal.kind,
                    timestamp: signal.timestamp,
                });
            }
        }

        self.signal_keys.extend(batch_keys);
        for signal in batch {
            self.series
                .entry((signal.region_id, signal.kind))
                .or_default()
                .push((signal.timestamp, signal.value));
        }
        Ok(self)
    }

    /// Add a batch of forecast points; rejected batches leave no trace
    pub fn add_forecasts(
        &mut self,
        batch: Vec<ForecastRecord>,
    ) -> Result<&mut Self, IngestionError> {
        let mut batch_keys = HashSet::with_capacity(batch.len());
        let mut targets = Vec::with_capacity(batch.len());
        for (idx, record) in batch.iter().enumerate() {
            let row = idx + 1;
            if record.region_id.trim().is_empty() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: "empty region_id".to_owned(),
                });
            }
            if !record.kind.is_forecast() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!("{} is not a forecast series", record.kind),
                });
            }
            if !record.value.is_finite() {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!("non-finite value {}", record.value),
                });
            }
            if record.horizon_offset_secs < 0 {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!(
                        "negative horizon offset {}s",
                        record.horizon_offset_secs
                    ),
                });
            }
            let Some(target) = record.target_time() else {
                return Err(IngestionError::MalformedRow {
                    row,
                    reason: format!(
                        "horizon offset {}s is out of range",
                        record.horizon_offset_secs
                    ),
                });
            };
            let key = (
                record.region_id.clone(),
                record.kind,
                record.issued_at,
                record.horizon_offset_secs,
            );
            if self.forecast_keys.contains(&key) || !batch_keys.insert(key) {
                return Err(IngestionError::Duplicate {
                    row,
                    region_id: record.region_id.clone(),
                    kind: record.kind,
                    timestamp: target,
                });
            }
            targets.push(target);
        }

        self.forecast_keys.extend(batch_keys);
        for (record, target) in batch.into_iter().zip(targets) {
            self.forecasts
                .entry((record.region_id, record.kind))
                .or_default()
                .entry(record.issued_at)
                .or_default()
                .push((target, record.value));
        }
        Ok(self)
    }

    pub fn build(self) -> TimeSeriesStore {
        let series: BTreeMap<_, _> = self
            .series
            .into_iter()
            .map(|(key, mut points)| {
                points.sort_by_key(|(t, _)| *t);
                (key, points)
            })
            .collect();

        let forecasts: BTreeMap<_, _> = self
            .forecasts
            .into_iter()
            .map(|(key, by_issue)| {
                let issues = by_issue
                    .into_iter()
                    .map(|(issued_at, mut points)| {
                        points.sort_by_key(|(target, _)| *target);
                        ForecastIssue { issued_at, points }
                    })
                    .collect();
                (key, issues)
            })
            .collect();

        let store = TimeSeriesStore { series, forecasts };
        info!(
            "Time-series store built: {} regions, {} signals, {} forecast points",
            store.regions().len(),
            store.signal_count(),
            store.forecast_point_count()
        );
        store
    }
}
