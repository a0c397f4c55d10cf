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

use serde::{Deserialize, Serialize};

use crate::config::ConfigurationError;

/// Physical parameters of the storage asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryParams {
    /// Usable capacity (kWh)
    #[serde(default = "default_capacity_kwh")]
    pub capacity_kwh: f64,

    /// Lower SOC bound as a fraction of capacity
    #[serde(default = "default_soc_min")]
    pub soc_min: f64,

    /// Upper SOC bound as a fraction of capacity
    #[serde(default = "default_soc_max")]
    pub soc_max: f64,

    /// Fraction of charging power that ends up stored
    #[serde(default = "default_charge_eff")]
    pub charge_eff: f64,

    /// Fraction of withdrawn stored energy delivered to the grid
    #[serde(default = "default_discharge_eff")]
    pub discharge_eff: f64,

    #[serde(default = "default_max_power_kw")]
    pub max_charge_kw: f64,

    #[serde(default = "default_max_power_kw")]
    pub max_discharge_kw: f64,
}

fn default_capacity_kwh() -> f64 {
    50.0
}

fn default_soc_min() -> f64 {
    0.06 // 3 kWh floor of the 50 kWh reference unit
}

fn default_soc_max() -> f64 {
    1.0
}

fn default_charge_eff() -> f64 {
    0.95
}

fn default_discharge_eff() -> f64 {
    0.90
}

fn default_max_power_kw() -> f64 {
    15.0
}

impl Default for BatteryParams {
    fn default() -> Self {
        Self {
            capacity_kwh: default_capacity_kwh(),
            soc_min: default_soc_min(),
            soc_max: default_soc_max(),
            charge_eff: default_charge_eff(),
            discharge_eff: default_discharge_eff(),
            max_charge_kw: default_max_power_kw(),
            max_discharge_kw: default_max_power_kw(),
        }
    }
}

impl BatteryParams {
    /// Reject parameter sets the dynamics cannot honor
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.capacity_kwh.is_finite() || self.capacity_kwh <= 0.0 {
            return Err(ConfigurationError::new(
                "battery.capacity_kwh",
                format!("must be a positive number, got {}", self.capacity_kwh),
            ));
        }
        if !(0.0..=1.0).contains(&self.soc_min) {
            return Err(ConfigurationError::new(
                "battery.soc_min",
                format!("must be within [0, 1], got {}", self.soc_min),
            ));
        }
        if !(0.0..=1.0).contains(&self.soc_max) {
            return Err(ConfigurationError::new(
                "battery.soc_max",
                format!("must be within [0, 1], got {}", self.soc_max),
            ));
        }
        if self.soc_min >= self.soc_max {
            return Err(ConfigurationError::new(
                "battery.soc_min",
                format!(
                    "soc_min ({}) must be less than soc_max ({})",
                    self.soc_min, self.soc_max
                ),
            ));
        }
        for (name, eff) in [
            ("battery.charge_eff", self.charge_eff),
            ("battery.discharge_eff", self.discharge_eff),
        ] {
            if !eff.is_finite() || eff <= 0.0 || eff > 1.0 {
                return Err(ConfigurationError::new(
                    name,
                    format!("efficiency must be within (0, 1], got {eff}"),
                ));
            }
        }
        for (name, power) in [
            ("battery.max_charge_kw", self.max_charge_kw),
            ("battery.max_discharge_kw", self.max_discharge_kw),
        ] {
            if !power.is_finite() || power < 0.0 {
                return Err(ConfigurationError::new(
                    name,
                    format!("power limit must be a non-negative number, got {power}"),
                ));
            }
        }
        Ok(())
    }

    pub fn clamp_soc(&self, soc: f64) -> f64 {
        soc.clamp(self.soc_min, self.soc_max)
    }

    pub fn stored_energy_kwh(&self, soc: f64) -> f64 {
        soc * self.capacity_kwh
    }
}

/// Battery state owned by one running episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetState {
    pub soc: f64,
    pub params: BatteryParams,
}

impl AssetState {
    /// Create a state with `soc` forced into the operating range
    pub fn new(soc: f64, params: BatteryParams) -> Self {
        let soc = if soc.is_finite() {
            params.clamp_soc(soc)
        } else {
            params.soc_min
        };
        Self { soc, params }
    }

    pub fn stored_energy_kwh(&self) -> f64 {
        self.params.stored_energy_kwh(self.soc)
    }
}

/// Result of applying one power request to the battery
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    /// Power the agent asked for (kW, positive = charge)
    pub requested_kw: f64,
    /// Power actually exchanged with the grid (kW, positive = charge)
    pub realized_kw: f64,
    /// Change of stored energy (kWh)
    pub stored_delta_kwh: f64,
    /// Energy drawn from the grid over the step, negative when exporting (kWh)
    pub grid_energy_kwh: f64,
    /// Whether the request had to be curtailed
    pub infeasible: bool,
}

impl DispatchOutcome {
    pub fn idle() -> Self {
        Self {
            requested_kw: 0.0,
            realized_kw: 0.0,
            stored_delta_kwh: 0.0,
            grid_energy_kwh: 0.0,
            infeasible: false,
        }
    }

    /// Absolute curtailment applied to the request (kW)
    pub fn curtailed_kw(&self) -> f64 {
        (self.requested_kw - self.realized_kw).abs()
    }
}
