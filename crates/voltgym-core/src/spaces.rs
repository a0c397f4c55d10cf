// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use voltgym_types::{ActionScaling, BatteryParams, SignalKind, feature_labels};

use crate::store::TimeSeriesStore;

/// Axis-aligned box of feature bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub labels: Vec<String>,
    pub low: Vec<f64>,
    pub high: Vec<f64>,
}

impl BoxSpace {
    pub fn dim(&self) -> usize {
        self.labels.len()
    }

    /// Whether `point` has the right dimension and lies within the bounds
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && point
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(x, (low, high))| *low <= *x && *x <= *high)
    }
}

/// Observed value range of every kind over a set of regions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketBounds {
    by_kind: BTreeMap<SignalKind, (f64, f64)>,
}

impl MarketBounds {
    pub fn from_store<S: AsRef<str>>(store: &TimeSeriesStore, regions: &[S]) -> Self {
        let mut bounds = Self::default();
        for region in regions {
            let region = region.as_ref();
            for kind in SignalKind::ALL {
                if kind.is_forecast() {
                    for issue in store.issues(region, kind) {
                        for (_, value) in &issue.points {
                            bounds.include(kind, *value);
                        }
                    }
                } else {
                    for (_, value) in store.series(region, kind) {
                        bounds.include(kind, *value);
                    }
                }
            }
        }
        bounds
    }

    fn include(&mut self, kind: SignalKind, value: f64) {
        let entry = self.by_kind.entry(kind).or_insert((value, value));
        entry.0 = entry.0.min(value);
        entry.1 = entry.1.max(value);
    }

    /// Bounds of one kind, unbounded when it was never observed
    pub fn get(&self, kind: SignalKind) -> (f64, f64) {
        self.by_kind
            .get(&kind)
            .copied()
            .unwrap_or((f64::NEG_INFINITY, f64::INFINITY))
    }

    /// Union of the bounds of a state kind and its issued forecasts
    fn forecast_target(&self, target: SignalKind) -> (f64, f64) {
        let (mut low, mut high) = self.get(target);
        for kind in SignalKind::ALL {
            if kind.forecast_target() == Some(target) {
                if let Some((l, h)) = self.by_kind.get(&kind) {
                    low = low.min(*l);
                    high = high.max(*h);
                }
            }
        }
        (low, high)
    }
}

/// Observation bounds matching [`voltgym_types::Observation::to_vector`]
pub fn observation_space(
    bounds: &MarketBounds,
    params: &BatteryParams,
    frame_forecasts: &[(SignalKind, usize)],
    forecast: Option<(SignalKind, usize)>,
) -> BoxSpace {
    let mut low = Vec::new();
    let mut high = Vec::new();
    let mut push = |(l, h): (f64, f64), count: usize| {
        low.extend(std::iter::repeat_n(l, count));
        high.extend(std::iter::repeat_n(h, count));
    };

    push((params.soc_min, params.soc_max), 1);
    push(bounds.get(SignalKind::Price), 1);
    push(bounds.get(SignalKind::Load), 1);
    push(bounds.get(SignalKind::Moer), 1);
    for (kind, horizon) in frame_forecasts {
        push(bounds.get(*kind), *horizon);
    }
    if let Some((target, horizon)) = forecast {
        push(bounds.forecast_target(target), horizon);
    }

    BoxSpace {
        labels: feature_labels(frame_forecasts, forecast),
        low,
        high,
    }
}

/// Range of valid agent actions
pub fn action_space(scaling: ActionScaling, params: &BatteryParams) -> BoxSpace {
    match scaling {
        ActionScaling::Kilowatts => BoxSpace {
            labels: vec!["power_kw".to_owned()],
            low: vec![-params.max_discharge_kw],
            high: vec![params.max_charge_kw],
        },
        ActionScaling::Normalized => BoxSpace {
            labels: vec!["power_fraction".to_owned()],
            low: vec![-1.0],
            high: vec![1.0],
        },
    }
}
