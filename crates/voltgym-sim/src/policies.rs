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

//! Baseline dispatch policies used to sanity-check environments.

use anyhow::{Result, bail};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voltgym_types::{BatteryParams, Observation};

/// Policy deciding the battery power of each step
pub trait DispatchPolicy: Send {
    /// Short identifier used on the command line
    fn id(&self) -> &str;

    /// Get the display name of this policy
    fn name(&self) -> &str;

    /// Power request in kW, positive to charge
    fn act(&mut self, observation: &Observation, params: &BatteryParams) -> f64;

    /// Prepare for a new episode
    fn reset(&mut self, _seed: u64) {}
}

/// Never touches the battery, the zero-reward reference
#[derive(Debug, Default)]
pub struct IdlePolicy;

impl DispatchPolicy for IdlePolicy {
    fn id(&self) -> &str {
        "idle"
    }

    fn name(&self) -> &str {
        "Idle"
    }

    fn act(&mut self, _observation: &Observation, _params: &BatteryParams) -> f64 {
        0.0
    }
}

/// Charges below one price and discharges above another, at full power
#[derive(Debug)]
pub struct PriceThresholdPolicy {
    /// Price ($/MWh) under which the battery charges
    charge_below: f64,
    /// Price ($/MWh) over which the battery discharges
    discharge_above: f64,
}

impl PriceThresholdPolicy {
    pub fn new(charge_below: f64, discharge_above: f64) -> Self {
        Self {
            charge_below,
            discharge_above,
        }
    }
}

impl Default for PriceThresholdPolicy {
    fn default() -> Self {
        Self::new(30.0, 70.0)
    }
}

impl DispatchPolicy for PriceThresholdPolicy {
    fn id(&self) -> &str {
        "threshold"
    }

    fn name(&self) -> &str {
        "Price-Threshold"
    }

    fn act(&mut self, observation: &Observation, params: &BatteryParams) -> f64 {
        if observation.price < self.charge_below {
            params.max_charge_kw
        } else if observation.price > self.discharge_above {
            -params.max_discharge_kw
        } else {
            0.0
        }
    }
}

/// Uniformly random power within the rate limits
#[derive(Debug)]
pub struct RandomPolicy {
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DispatchPolicy for RandomPolicy {
    fn id(&self) -> &str {
        "random"
    }

    fn name(&self) -> &str {
        "Random"
    }

    fn act(&mut self, _observation: &Observation, params: &BatteryParams) -> f64 {
        if params.max_charge_kw + params.max_discharge_kw <= 0.0 {
            return 0.0;
        }
        self.rng
            .gen_range(-params.max_discharge_kw..=params.max_charge_kw)
    }

    fn reset(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }
}

/// Compares the current price with the mean of the forecast slice
///
/// Without a forecast in the observation the policy stays idle.
#[derive(Debug)]
pub struct ForecastArbitragePolicy {
    /// Relative distance from the forecast mean that triggers dispatch
    margin: f64,
}

impl ForecastArbitragePolicy {
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }
}

impl Default for ForecastArbitragePolicy {
    fn default() -> Self {
        Self::new(0.15)
    }
}

impl DispatchPolicy for ForecastArbitragePolicy {
    fn id(&self) -> &str {
        "forecast"
    }

    fn name(&self) -> &str {
        "Forecast-Arbitrage"
    }

    fn act(&mut self, observation: &Observation, params: &BatteryParams) -> f64 {
        if observation.forecast.is_empty() {
            return 0.0;
        }
        let mean = observation.forecast.iter().map(|p| p.value).sum::<f64>()
            / observation.forecast.len() as f64;
        let band = mean.abs() * self.margin;

        if observation.price < mean - band {
            params.max_charge_kw
        } else if observation.price > mean + band {
            -params.max_discharge_kw
        } else {
            0.0
        }
    }
}

/// Identifiers accepted by [`parse_policies`]
pub const POLICY_IDS: &[&str] = &["idle", "threshold", "random", "forecast"];

pub fn policy_by_id(id: &str) -> Option<Box<dyn DispatchPolicy>> {
    match id {
        "idle" => Some(Box::new(IdlePolicy)),
        "threshold" => Some(Box::new(PriceThresholdPolicy::default())),
        "random" => Some(Box::new(RandomPolicy::default())),
        "forecast" => Some(Box::new(ForecastArbitragePolicy::default())),
        _ => None,
    }
}

/// Parse a comma-separated list of policy ids, or "all"
pub fn parse_policies(spec: &str) -> Result<Vec<Box<dyn DispatchPolicy>>> {
    let ids: Vec<&str> = if spec.trim() == "all" {
        POLICY_IDS.to_vec()
    } else {
        spec.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .collect()
    };
    if ids.is_empty() {
        bail!("No policies given");
    }

    ids.into_iter()
        .map(|id| {
            policy_by_id(id).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown policy '{}' (available: {})",
                    id,
                    POLICY_IDS.join(", ")
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use voltgym_types::{ForecastPoint, SignalKind};

    fn observation(price: f64, forecast: &[f64]) -> Observation {
        let timestamp = Utc.with_ymd_and_hms(2021, 10, 1, 12, 0, 0).unwrap();
        Observation {
            timestamp,
            region_id: "SDGE".to_owned(),
            step: 0,
            soc: 0.5,
            stored_energy_kwh: 25.0,
            load: 2000.0,
            price,
            moer: 800.0,
            frame_forecasts: BTreeMap::new(),
            forecast_target: (!forecast.is_empty()).then_some(SignalKind::Price),
            forecast: forecast
                .iter()
                .map(|value| ForecastPoint {
                    timestamp,
                    value: *value,
                })
                .collect(),
        }
    }

    #[test]
    fn test_threshold_policy() {
        let params = BatteryParams::default();
        let mut policy = PriceThresholdPolicy::new(20.0, 60.0);
        assert_eq!(policy.act(&observation(10.0, &[]), &params), params.max_charge_kw);
        assert_eq!(policy.act(&observation(40.0, &[]), &params), 0.0);
        assert_eq!(policy.act(&observation(90.0, &[]), &params), -params.max_discharge_kw);
    }

    #[test]
    fn test_random_policy_is_seeded_and_bounded() {
        let params = BatteryParams::default();
        let obs = observation(40.0, &[]);
        let mut a = RandomPolicy::new(5);
        let mut b = RandomPolicy::new(5);
        for _ in 0..100 {
            let action = a.act(&obs, &params);
            assert_eq!(action, b.act(&obs, &params));
            assert!((-params.max_discharge_kw..=params.max_charge_kw).contains(&action));
        }

        a.reset(9);
        b.reset(9);
        assert_eq!(a.act(&obs, &params), b.act(&obs, &params));
    }

    #[test]
    fn test_forecast_policy_follows_spread() {
        let params = BatteryParams::default();
        let mut policy = ForecastArbitragePolicy::new(0.1);
        assert_eq!(policy.act(&observation(20.0, &[50.0, 50.0]), &params), params.max_charge_kw);
        assert_eq!(policy.act(&observation(80.0, &[50.0, 50.0]), &params), -params.max_discharge_kw);
        assert_eq!(policy.act(&observation(52.0, &[50.0, 50.0]), &params), 0.0);
        assert_eq!(policy.act(&observation(1.0, &[]), &params), 0.0);
    }

    #[test]
    fn test_parse_policies() {
        let all = parse_policies("all").unwrap();
        assert_eq!(all.len(), POLICY_IDS.len());

        let some = parse_policies("idle, threshold").unwrap();
        let ids: Vec<&str> = some.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["idle", "threshold"]);

        assert!(parse_policies("idle,unknown").is_err());
        assert!(parse_policies(" , ").is_err());
    }
}
