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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::episode::TerminationReason;
use crate::signal::SignalKind;

/// One point of a forecast slice
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Snapshot handed to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub region_id: String,
    /// Decisions taken so far in the episode
    pub step: usize,

    // Asset
    pub soc: f64,
    pub stored_energy_kwh: f64,

    // Market slice
    pub load: f64,
    pub price: f64,
    pub moer: f64,
    pub frame_forecasts: BTreeMap<SignalKind, Vec<f64>>,

    /// Kind predicted by `forecast`, `None` when forecasts are disabled
    pub forecast_target: Option<SignalKind>,
    pub forecast: Vec<ForecastPoint>,
}

impl Observation {
    /// Flatten into the feature order reported by [`Observation::labels`]
    pub fn to_vector(&self) -> Vec<f64> {
        let mut features = Vec::with_capacity(4 + self.forecast.len());
        features.push(self.soc);
        features.push(self.price);
        features.push(self.load);
        features.push(self.moer);
        for values in self.frame_forecasts.values() {
            features.extend_from_slice(values);
        }
        features.extend(self.forecast.iter().map(|p| p.value));
        features
    }

    pub fn labels(&self) -> Vec<String> {
        let frame_layout: Vec<(SignalKind, usize)> = self
            .frame_forecasts
            .iter()
            .map(|(kind, values)| (*kind, values.len()))
            .collect();
        feature_labels(
            &frame_layout,
            self.forecast_target.map(|kind| (kind, self.forecast.len())),
        )
    }
}

/// Feature names of a flattened observation
///
/// `frame_forecasts` must be in ascending kind order, matching the map order
/// used by [`Observation::to_vector`].
pub fn feature_labels(
    frame_forecasts: &[(SignalKind, usize)],
    forecast: Option<(SignalKind, usize)>,
) -> Vec<String> {
    let mut labels = vec![
        "state_of_charge".to_owned(),
        "locational_marginal_price".to_owned(),
        "load".to_owned(),
        "marginal_operating_emissions_rate".to_owned(),
    ];
    for (kind, horizon) in frame_forecasts {
        if *horizon == 1 {
            labels.push(kind.as_str().to_owned());
        } else {
            labels.extend((1..=*horizon).map(|j| format!("{kind}_{j}")));
        }
    }
    if let Some((target, horizon)) = forecast {
        labels.extend((1..=horizon).map(|j| format!("forecast_{target}_{j}")));
    }
    labels
}

/// Components of a step reward
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardBreakdown {
    /// Revenue of exported energy minus cost of imported energy
    pub economic: f64,
    /// Weighted emissions term (already signed)
    pub emissions: f64,
    /// Weighted curtailment penalty (already signed)
    pub infeasibility: f64,
    pub total: f64,
}

/// Diagnostics attached to a transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub requested_kw: f64,
    pub realized_kw: f64,
    pub grid_energy_kwh: f64,
    pub infeasible: bool,
    pub reward: RewardBreakdown,
    pub termination: Option<TerminationReason>,
}

/// Unit exchanged with the training harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub observation: Observation,
    /// Action as submitted by the agent, before scaling
    pub action: f64,
    pub reward: f64,
    pub next_observation: Observation,
    pub done: bool,
    pub info: StepInfo,
}
