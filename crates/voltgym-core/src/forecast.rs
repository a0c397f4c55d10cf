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

//! Forecast injection.
//!
//! A [`Forecaster`] answers `(region, timestamp, horizon)` with a lazy
//! sequence of at most `horizon` points at `timestamp + j * step`. Every call
//! starts from scratch; forecasters keep no cursor between calls. The
//! sequence may end early when the source runs out of data.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use voltgym_types::{ConfigurationError, ForecastConfig, ForecastMode, ForecastPoint, SignalKind};

use crate::store::TimeSeriesStore;

/// Source of forecast slices for observations
pub trait Forecaster: Send + Sync {
    /// Get the name of this forecaster
    fn name(&self) -> &str;

    /// Kind being forecast
    fn target(&self) -> SignalKind;

    /// Points at `timestamp + j * step` for `j = 1..=horizon`
    fn forecast<'a>(
        &'a self,
        region_id: &'a str,
        timestamp: DateTime<Utc>,
        horizon: usize,
    ) -> Box<dyn Iterator<Item = ForecastPoint> + 'a>;

    /// Whether forecasts read realized values after the decision time
    fn is_oracle(&self) -> bool {
        false
    }
}

/// Externally produced forecasts
///
/// `issued_at` is the decision time; implementations must only use
/// information available at that instant.
pub trait ForecastModel: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, region_id: &str, issued_at: DateTime<Utc>, target: DateTime<Utc>) -> Option<f64>;
}

/// Perfect foresight from the store, for offline ablations only
pub struct OracleForecaster {
    store: Arc<TimeSeriesStore>,
    target: SignalKind,
    step: Duration,
    max_staleness: Duration,
}

impl OracleForecaster {
    /// Fails when the environment is flagged as deployment-style evaluation
    pub fn new(
        store: Arc<TimeSeriesStore>,
        target: SignalKind,
        step: Duration,
        max_staleness: Duration,
        deployment: bool,
    ) -> Result<Self, ConfigurationError> {
        if deployment {
            return Err(ConfigurationError::new(
                "forecast.mode",
                "oracle forecasts are not allowed in deployment-style evaluation",
            ));
        }
        if target.is_forecast() {
            return Err(ConfigurationError::new(
                "forecast.target",
                format!("oracle target must be a state-like series, got {target}"),
            ));
        }
        Ok(Self {
            store,
            target,
            step,
            max_staleness,
        })
    }
}

impl fmt::Debug for OracleForecaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleForecaster")
            .field("target", &self.target)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl Forecaster for OracleForecaster {
    fn name(&self) -> &str {
        "oracle"
    }

    fn target(&self) -> SignalKind {
        self.target
    }

    fn is_oracle(&self) -> bool {
        true
    }

    fn forecast<'a>(
        &'a self,
        region_id: &'a str,
        timestamp: DateTime<Utc>,
        horizon: usize,
    ) -> Box<dyn Iterator<Item = ForecastPoint> + 'a> {
        Box::new((1..=horizon).map_while(move |j| {
            let at = timestamp + self.step * j as i32;
            self.store
                .carried_forward(region_id, self.target, at, self.max_staleness)
                .map(|value| ForecastPoint {
                    timestamp: at,
                    value,
                })
        }))
    }
}

/// Delegates to a supplied [`ForecastModel`]
pub struct ExternalForecaster {
    model: Box<dyn ForecastModel>,
    target: SignalKind,
    step: Duration,
}

impl ExternalForecaster {
    pub fn new(model: Box<dyn ForecastModel>, target: SignalKind, step: Duration) -> Self {
        Self {
            model,
            target,
            step,
        }
    }
}

impl fmt::Debug for ExternalForecaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalForecaster")
            .field("model", &self.model.name())
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl Forecaster for ExternalForecaster {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn target(&self) -> SignalKind {
        self.target
    }

    fn forecast<'a>(
        &'a self,
        region_id: &'a str,
        timestamp: DateTime<Utc>,
        horizon: usize,
    ) -> Box<dyn Iterator<Item = ForecastPoint> + 'a> {
        Box::new((1..=horizon).map_while(move |j| {
            let at = timestamp + self.step * j as i32;
            self.model
                .predict(region_id, timestamp, at)
                .filter(|value| value.is_finite())
                .map(|value| ForecastPoint {
                    timestamp: at,
                    value,
                })
        }))
    }
}

/// Forecast model backed by ingested forecast issues
///
/// Each target takes the newest issue that was published by the decision
/// time, is within the age limit and reaches the target.
pub struct IssuedForecastModel {
    store: Arc<TimeSeriesStore>,
    kind: SignalKind,
    max_age: Duration,
}

impl IssuedForecastModel {
    pub fn new(store: Arc<TimeSeriesStore>, kind: SignalKind, max_age: Duration) -> Self {
        Self {
            store,
            kind,
            max_age,
        }
    }
}

impl ForecastModel for IssuedForecastModel {
    fn name(&self) -> &str {
        "issued"
    }

    fn predict(&self, region_id: &str, issued_at: DateTime<Utc>, target: DateTime<Utc>) -> Option<f64> {
        self.store
            .issues_until(region_id, self.kind, issued_at)
            .iter()
            .rev()
            .take_while(|issue| issued_at - issue.issued_at <= self.max_age)
            .find(|issue| issue.covers(target, target))
            .and_then(|issue| issue.value_at(target))
    }
}

/// Naive model repeating the last observed value
pub struct PersistenceModel {
    store: Arc<TimeSeriesStore>,
    kind: SignalKind,
}

impl PersistenceModel {
    pub fn new(store: Arc<TimeSeriesStore>, kind: SignalKind) -> Self {
        Self { store, kind }
    }
}

impl ForecastModel for PersistenceModel {
    fn name(&self) -> &str {
        "persistence"
    }

    fn predict(&self, region_id: &str, issued_at: DateTime<Utc>, _target: DateTime<Utc>) -> Option<f64> {
        self.store
            .latest_at(region_id, self.kind, issued_at)
            .map(|(_, value)| value)
    }
}

/// Forecaster selected by `config.mode`, `None` when forecasts are disabled
pub fn build_forecaster(
    config: &ForecastConfig,
    store: &Arc<TimeSeriesStore>,
    step: Duration,
    max_staleness: Duration,
    max_forecast_age: Duration,
    deployment: bool,
) -> Result<Option<Box<dyn Forecaster>>, ConfigurationError> {
    match config.mode {
        ForecastMode::None => Ok(None),
        ForecastMode::Oracle => Ok(Some(Box::new(OracleForecaster::new(
            Arc::clone(store),
            config.target,
            step,
            max_staleness,
            deployment,
        )?))),
        ForecastMode::Issued => {
            let kind = config.issued_kind().ok_or_else(|| {
                ConfigurationError::new(
                    "forecast.target",
                    format!("no issued forecast series exists for {}", config.target),
                )
            })?;
            let model = IssuedForecastModel::new(Arc::clone(store), kind, max_forecast_age);
            Ok(Some(Box::new(ExternalForecaster::new(
                Box::new(model),
                config.target,
                step,
            ))))
        }
    }
}
