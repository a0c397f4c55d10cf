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

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::asset::BatteryParams;
use crate::signal::SignalKind;

/// Invalid physical or episode parameter, raised before any episode runs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration for {parameter}: {reason}")]
pub struct ConfigurationError {
    pub parameter: String,
    pub reason: String,
}

impl ConfigurationError {
    pub fn new(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }
}

// ============= Environment Configuration =============

/// Complete configuration of a dispatch environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Regions to align; empty means every region in the store
    #[serde(default)]
    pub regions: Vec<String>,
    pub split: SplitConfig,
    #[serde(default)]
    pub episode: EpisodeSettings,
    #[serde(default)]
    pub battery: BatteryParams,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub reward: RewardConfig,
    #[serde(default)]
    pub alignment: AlignmentConfig,
    #[serde(default)]
    pub action_scaling: ActionScaling,
    /// Deployment-style evaluation forbids oracle forecasts
    #[serde(default)]
    pub deployment: bool,
}

/// Longest simulation step, one day
pub const MAX_STEP_MINUTES: i64 = 24 * 60;
/// Longest episode, ten years
pub const MAX_EPISODE_MINUTES: i64 = 10 * 366 * 24 * 60;
/// Longest carry-forward of a state-like value, one year
pub const MAX_STALENESS_MINUTES: i64 = 366 * 24 * 60;
/// Oldest usable forecast issue, one year
pub const MAX_FORECAST_AGE_HOURS: i64 = 366 * 24;

impl EnvConfig {
    /// Configuration with default physics around the given split boundaries
    pub fn new(train_end: DateTime<Utc>, test_start: DateTime<Utc>) -> Self {
        Self {
            regions: Vec::new(),
            split: SplitConfig {
                train_end,
                test_start,
            },
            episode: EpisodeSettings::default(),
            battery: BatteryParams::default(),
            forecast: ForecastConfig::default(),
            reward: RewardConfig::default(),
            alignment: AlignmentConfig::default(),
            action_scaling: ActionScaling::default(),
            deployment: false,
        }
    }

    /// Simulation step; only meaningful on a validated config
    pub fn step_size(&self) -> Duration {
        Duration::try_minutes(self.episode.step_minutes).unwrap_or(Duration::MAX)
    }

    pub fn step_hours(&self) -> f64 {
        self.episode.step_minutes as f64 / 60.0
    }

    /// Fail fast on parameter combinations no episode could run with
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.battery.validate()?;

        if self.split.train_end > self.split.test_start {
            return Err(ConfigurationError::new(
                "split.train_end",
                format!(
                    "train boundary {} is after test boundary {}",
                    self.split.train_end, self.split.test_start
                ),
            ));
        }

        if self.episode.steps == 0 {
            return Err(ConfigurationError::new(
                "episode.steps",
                "episode must take at least one step",
            ));
        }
        if !(1..=MAX_STEP_MINUTES).contains(&self.episode.step_minutes) {
            return Err(ConfigurationError::new(
                "episode.step_minutes",
                format!(
                    "must be within 1..={MAX_STEP_MINUTES}, got {}",
                    self.episode.step_minutes
                ),
            ));
        }
        let span = i64::try_from(self.episode.steps)
            .ok()
            .and_then(|steps| steps.checked_mul(self.episode.step_minutes))
            .filter(|span| *span <= MAX_EPISODE_MINUTES);
        if span.is_none() {
            return Err(ConfigurationError::new(
                "episode.steps",
                format!(
                    "{} steps of {} min exceed the longest episode of {MAX_EPISODE_MINUTES} min",
                    self.episode.steps, self.episode.step_minutes
                ),
            ));
        }
        self.episode.train_initial_soc.validate()?;
        if !(0.0..=1.0).contains(&self.episode.test_initial_soc) {
            return Err(ConfigurationError::new(
                "episode.test_initial_soc",
                format!("must be within [0, 1], got {}", self.episode.test_initial_soc),
            ));
        }

        self.alignment.validate()?;
        self.reward.validate()?;
        self.forecast.validate(self.deployment)?;

        Ok(())
    }
}

/// Temporal train/test boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Train frames are strictly before this instant
    pub train_end: DateTime<Utc>,
    /// Test frames are at or after this instant
    pub test_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSettings {
    /// Decisions per full episode
    #[serde(default = "default_episode_steps")]
    pub steps: usize,
    #[serde(default = "default_step_minutes")]
    pub step_minutes: i64,
    #[serde(default)]
    pub train_initial_soc: InitialSocConfig,
    #[serde(default = "default_test_initial_soc")]
    pub test_initial_soc: f64,
}

fn default_episode_steps() -> usize {
    288 // one day of 5-minute steps
}

fn default_step_minutes() -> i64 {
    5
}

fn default_test_initial_soc() -> f64 {
    0.6
}

impl Default for EpisodeSettings {
    fn default() -> Self {
        Self {
            steps: default_episode_steps(),
            step_minutes: default_step_minutes(),
            train_initial_soc: InitialSocConfig::default(),
            test_initial_soc: default_test_initial_soc(),
        }
    }
}

/// Distribution of the initial SOC of training episodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InitialSocConfig {
    Fixed { soc: f64 },
    Uniform { low: f64, high: f64 },
    /// Normal truncated at one standard deviation around the mean
    TruncatedNormal { mean: f64, std: f64 },
}

impl Default for InitialSocConfig {
    fn default() -> Self {
        Self::TruncatedNormal {
            mean: 0.6,
            std: 0.1,
        }
    }
}

impl InitialSocConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        let parameter = "episode.train_initial_soc";
        match *self {
            Self::Fixed { soc } if !soc.is_finite() => Err(ConfigurationError::new(
                parameter,
                "fixed SOC must be a finite number",
            )),
            Self::Uniform { low, high } if !(low.is_finite() && high.is_finite() && low <= high) => {
                Err(ConfigurationError::new(
                    parameter,
                    format!("uniform bounds must satisfy low <= high, got [{low}, {high}]"),
                ))
            }
            Self::TruncatedNormal { mean, std } if !(mean.is_finite() && std.is_finite() && std >= 0.0) => {
                Err(ConfigurationError::new(
                    parameter,
                    format!("truncated normal needs a finite mean and std >= 0, got ({mean}, {std})"),
                ))
            }
            _ => Ok(()),
        }
    }
}

// ============= Forecasts =============

/// Source of the forecast slice in observations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMode {
    #[default]
    None,
    /// True future values, offline ablation only
    Oracle,
    /// Latest issued forecast vector available at the decision time
    Issued,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default)]
    pub mode: ForecastMode,
    /// State-like series being forecast
    #[serde(default = "default_forecast_target")]
    pub target: SignalKind,
    #[serde(default = "default_forecast_horizon")]
    pub horizon_steps: usize,
}

fn default_forecast_target() -> SignalKind {
    SignalKind::Price
}

fn default_forecast_horizon() -> usize {
    12 // one hour at 5-minute steps
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            mode: ForecastMode::default(),
            target: default_forecast_target(),
            horizon_steps: default_forecast_horizon(),
        }
    }
}

impl ForecastConfig {
    fn validate(&self, deployment: bool) -> Result<(), ConfigurationError> {
        if self.mode == ForecastMode::None {
            return Ok(());
        }
        if self.target.is_forecast() {
            return Err(ConfigurationError::new(
                "forecast.target",
                format!("target must be a state-like series, got {}", self.target),
            ));
        }
        if self.horizon_steps == 0 {
            return Err(ConfigurationError::new(
                "forecast.horizon_steps",
                "horizon must be at least one step",
            ));
        }
        match self.mode {
            ForecastMode::Oracle if deployment => Err(ConfigurationError::new(
                "forecast.mode",
                "oracle forecasts are not allowed in deployment-style evaluation",
            )),
            ForecastMode::Issued if issued_kind_for(self.target).is_none() => {
                Err(ConfigurationError::new(
                    "forecast.target",
                    format!("no issued forecast series exists for {}", self.target),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Forecast series backing `ForecastMode::Issued`
    pub fn issued_kind(&self) -> Option<SignalKind> {
        issued_kind_for(self.target)
    }
}

fn issued_kind_for(target: SignalKind) -> Option<SignalKind> {
    SignalKind::ALL
        .into_iter()
        .find(|kind| kind.forecast_target() == Some(target))
}

// ============= Reward =============

/// Unit of the ingested price and emission rate series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    #[default]
    PerMwh,
    PerKwh,
}

impl PriceUnit {
    /// Multiplier converting a value in this unit to a per-kWh value
    pub fn per_kwh_factor(self) -> f64 {
        match self {
            Self::PerMwh => 0.001,
            Self::PerKwh => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    #[serde(default = "default_economic_weight")]
    pub economic_weight: f64,
    #[serde(default)]
    pub emissions_weight: f64,
    #[serde(default)]
    pub infeasibility_weight: f64,
    #[serde(default)]
    pub price_unit: PriceUnit,
    #[serde(default)]
    pub moer_unit: PriceUnit,
}

fn default_economic_weight() -> f64 {
    1.0
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            economic_weight: default_economic_weight(),
            emissions_weight: 0.0,
            infeasibility_weight: 0.0,
            price_unit: PriceUnit::default(),
            moer_unit: PriceUnit::default(),
        }
    }
}

impl RewardConfig {
    fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, weight) in [
            ("reward.economic_weight", self.economic_weight),
            ("reward.emissions_weight", self.emissions_weight),
            ("reward.infeasibility_weight", self.infeasibility_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigurationError::new(
                    name,
                    format!("weight must be a non-negative number, got {weight}"),
                ));
            }
        }
        Ok(())
    }
}

// ============= Alignment =============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Oldest state-like observation that may be carried forward
    #[serde(default = "default_max_staleness_minutes")]
    pub max_staleness_minutes: i64,
    /// Oldest forecast issue that may still be used
    #[serde(default = "default_max_forecast_age_hours")]
    pub max_forecast_age_hours: i64,
    /// Issued forecast kinds carried in every frame
    #[serde(default)]
    pub forecast_kinds: Vec<SignalKind>,
    /// Lookahead of the per-frame forecast values
    #[serde(default = "default_frame_horizon")]
    pub forecast_horizon_steps: usize,
    /// Optional data window; defaults to the region's coverage
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
}

fn default_max_staleness_minutes() -> i64 {
    60
}

fn default_max_forecast_age_hours() -> i64 {
    48
}

fn default_frame_horizon() -> usize {
    1
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            max_staleness_minutes: default_max_staleness_minutes(),
            max_forecast_age_hours: default_max_forecast_age_hours(),
            forecast_kinds: Vec::new(),
            forecast_horizon_steps: default_frame_horizon(),
            start: None,
            end: None,
        }
    }
}

impl AlignmentConfig {
    pub fn max_staleness(&self) -> Duration {
        Duration::try_minutes(self.max_staleness_minutes).unwrap_or(Duration::MAX)
    }

    pub fn max_forecast_age(&self) -> Duration {
        Duration::try_hours(self.max_forecast_age_hours).unwrap_or(Duration::MAX)
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if !(0..=MAX_STALENESS_MINUTES).contains(&self.max_staleness_minutes) {
            return Err(ConfigurationError::new(
                "alignment.max_staleness_minutes",
                format!(
                    "must be within 0..={MAX_STALENESS_MINUTES}, got {}",
                    self.max_staleness_minutes
                ),
            ));
        }
        if !(0..=MAX_FORECAST_AGE_HOURS).contains(&self.max_forecast_age_hours) {
            return Err(ConfigurationError::new(
                "alignment.max_forecast_age_hours",
                format!(
                    "must be within 0..={MAX_FORECAST_AGE_HOURS}, got {}",
                    self.max_forecast_age_hours
                ),
            ));
        }
        if let Some(kind) = self.forecast_kinds.iter().find(|k| !k.is_forecast()) {
            return Err(ConfigurationError::new(
                "alignment.forecast_kinds",
                format!("{kind} is not a forecast series"),
            ));
        }
        if !self.forecast_kinds.is_empty() && self.forecast_horizon_steps == 0 {
            return Err(ConfigurationError::new(
                "alignment.forecast_horizon_steps",
                "horizon must be at least one step when forecast kinds are aligned",
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(ConfigurationError::new(
                    "alignment.start",
                    format!("data window start {start} is not before end {end}"),
                ));
            }
        }
        Ok(())
    }
}

/// Interpretation of the agent's action value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionScaling {
    /// Action is a power request in kW
    #[default]
    Kilowatts,
    /// Action in `[-1, 1]` scaled onto the power limits
    Normalized,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn boundaries() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2021, 10, 20, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 10, 21, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let (train_end, test_start) = boundaries();
        let config = EnvConfig::new(train_end, test_start);
        assert!(config.validate().is_ok());
        assert_eq!(config.episode.steps, 288);
        assert_eq!(config.step_size(), Duration::minutes(5));
    }

    #[test]
    fn test_train_boundary_after_test_rejected() {
        let (train_end, test_start) = boundaries();
        let config = EnvConfig::new(test_start, train_end);
        let err = config.validate().unwrap_err();
        assert_eq!(err.parameter, "split.train_end");
    }

    #[test]
    fn test_oracle_rejected_in_deployment() {
        let (train_end, test_start) = boundaries();
        let mut config = EnvConfig::new(train_end, test_start);
        config.forecast.mode = ForecastMode::Oracle;
        assert!(config.validate().is_ok());

        config.deployment = true;
        let err = config.validate().unwrap_err();
        assert_eq!(err.parameter, "forecast.mode");
    }

    #[test]
    fn test_issued_mode_requires_forecast_series() {
        let (train_end, test_start) = boundaries();
        let mut config = EnvConfig::new(train_end, test_start);
        config.forecast.mode = ForecastMode::Issued;
        assert_eq!(config.forecast.issued_kind(), Some(SignalKind::PriceForecast));

        config.forecast.target = SignalKind::Moer;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_state_kind_rejected_as_frame_forecast() {
        let (train_end, test_start) = boundaries();
        let mut config = EnvConfig::new(train_end, test_start);
        config.alignment.forecast_kinds = vec![SignalKind::Load];
        let err = config.validate().unwrap_err();
        assert_eq!(err.parameter, "alignment.forecast_kinds");
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let (train_end, test_start) = boundaries();
        let base = EnvConfig::new(train_end, test_start);

        let mut config = base.clone();
        config.episode.step_minutes = i64::MAX / 10;
        assert_eq!(config.validate().unwrap_err().parameter, "episode.step_minutes");

        let mut config = base.clone();
        config.episode.step_minutes = MAX_STEP_MINUTES;
        config.episode.steps = usize::MAX;
        assert_eq!(config.validate().unwrap_err().parameter, "episode.steps");

        let mut config = base.clone();
        config.alignment.max_staleness_minutes = i64::MAX;
        assert_eq!(
            config.validate().unwrap_err().parameter,
            "alignment.max_staleness_minutes"
        );

        let mut config = base.clone();
        config.alignment.max_forecast_age_hours = i64::MAX / 2;
        assert_eq!(
            config.validate().unwrap_err().parameter,
            "alignment.max_forecast_age_hours"
        );

        let mut config = base;
        config.episode.step_minutes = MAX_STEP_MINUTES;
        config.episode.steps = 30;
        config.alignment.max_staleness_minutes = MAX_STALENESS_MINUTES;
        config.alignment.max_forecast_age_hours = MAX_FORECAST_AGE_HOURS;
        assert!(config.validate().is_ok());
        assert_eq!(config.step_size(), Duration::days(1));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let (train_end, test_start) = boundaries();
        let mut config = EnvConfig::new(train_end, test_start);
        config.reward.emissions_weight = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let config: EnvConfig = toml::from_str(
            r#"
            regions = ["SDGE"]
            action_scaling = "normalized"

            [split]
            train_end = "2021-10-20T00:00:00Z"
            test_start = "2021-10-21T00:00:00Z"

            [episode]
            steps = 96
            train_initial_soc = { mode = "uniform", low = 0.2, high = 0.8 }

            [battery]
            capacity_kwh = 10.0

            [reward]
            emissions_weight = 0.5
            price_unit = "per_kwh"

            [forecast]
            mode = "oracle"
            horizon_steps = 6
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.regions, vec!["SDGE".to_owned()]);
        assert_eq!(config.episode.steps, 96);
        assert_eq!(config.episode.step_minutes, 5);
        assert_eq!(
            config.episode.train_initial_soc,
            InitialSocConfig::Uniform { low: 0.2, high: 0.8 }
        );
        assert_eq!(config.battery.capacity_kwh, 10.0);
        assert_eq!(config.battery.max_discharge_kw, 15.0);
        assert_eq!(config.reward.price_unit, PriceUnit::PerKwh);
        assert_eq!(config.reward.moer_unit, PriceUnit::PerMwh);
        assert_eq!(config.forecast.mode, ForecastMode::Oracle);
        assert_eq!(config.action_scaling, ActionScaling::Normalized);
    }

    #[test]
    fn test_per_kwh_factor() {
        assert!((50.0 * PriceUnit::PerMwh.per_kwh_factor() - 0.05).abs() < 1e-12);
        assert_eq!(PriceUnit::PerKwh.per_kwh_factor(), 1.0);
    }
}
