// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Synthetic market scenarios.
//!
//! Each scenario produces state-like series on a fixed clock plus hourly
//! price and load forecast issues, all driven by a seeded generator:
//!
//! - **Usual Day**: Cheap overnight, solar dip at noon, evening peak
//! - **Volatile**: Large price swings with arbitrage opportunities
//! - **Negative Prices**: Negative midday prices from renewable surplus
//! - **Flat**: Constant price, no arbitrage at all

use chrono::{DateTime, Duration, Timelike, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use voltgym_types::{ForecastRecord, MarketSignal, SignalKind};

/// Market scenario types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketScenario {
    UsualDay,
    Volatile,
    NegativePrices,
    Flat,
}

/// Market scenario preset with metadata
#[derive(Debug, Clone)]
pub struct ScenarioPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub scenario: MarketScenario,
}

/// Available scenario presets
pub const SCENARIO_PRESETS: &[ScenarioPreset] = &[
    ScenarioPreset {
        id: "usual_day",
        name: "Usual Day",
        description: "Cheap overnight (0-6), solar dip (10-16), evening peak (16-21)",
        scenario: MarketScenario::UsualDay,
    },
    ScenarioPreset {
        id: "volatile",
        name: "Volatile",
        description: "Large price swings throughout the day, testing arbitrage opportunities",
        scenario: MarketScenario::Volatile,
    },
    ScenarioPreset {
        id: "negative",
        name: "Negative Prices",
        description: "Negative prices during midday (high renewable generation)",
        scenario: MarketScenario::NegativePrices,
    },
    ScenarioPreset {
        id: "flat",
        name: "Flat",
        description: "Constant price, a battery cannot earn anything",
        scenario: MarketScenario::Flat,
    },
];

/// Look up a preset by id
pub fn preset(id: &str) -> Option<&'static ScenarioPreset> {
    SCENARIO_PRESETS.iter().find(|preset| preset.id == id)
}

/// Shape of a generated data set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub region_id: String,
    pub start: DateTime<Utc>,
    pub days: u32,
    pub step_minutes: i64,
    pub seed: u64,
    /// Relative error of issued forecasts
    pub forecast_noise: f64,
}

/// Generated records, ready for the store builder
#[derive(Debug, Clone, Default)]
pub struct SyntheticMarket {
    pub signals: Vec<MarketSignal>,
    pub forecasts: Vec<ForecastRecord>,
}

/// Hours covered by every forecast issue
const FORECAST_HOURS: i64 = 24;

impl MarketScenario {
    pub fn name(self) -> &'static str {
        match self {
            Self::UsualDay => "Usual Day",
            Self::Volatile => "Volatile Prices",
            Self::NegativePrices => "Negative Prices",
            Self::Flat => "Flat",
        }
    }

    /// Price band in $/MWh for an hour of the day
    fn price_band(self, hour: u32) -> (f64, f64) {
        match self {
            Self::UsualDay => {
                let base = match hour {
                    0..=5 => 35.0,   // Cheap overnight
                    6..=9 => 55.0,   // Morning ramp
                    10..=15 => 25.0, // Solar dip
                    16..=20 => 95.0, // Evening peak
                    _ => 50.0,       // Late evening decline
                };
                (base * 0.9, base * 1.1)
            }
            Self::Volatile => match hour {
                0..=2 => (20.0, 35.0),
                3..=5 => (5.0, 20.0),
                6..=8 => (70.0, 120.0),
                9..=11 => (30.0, 60.0),
                12..=14 => (0.0, 25.0),
                15..=16 => (60.0, 90.0),
                17..=19 => (150.0, 260.0),
                20..=21 => (80.0, 120.0),
                _ => (30.0, 50.0),
            },
            Self::NegativePrices => {
                let base: f64 = match hour {
                    0..=5 => 35.0,
                    6..=9 => 50.0,
                    10..=14 => -15.0, // Renewable surplus
                    15..=16 => 45.0,
                    17..=20 => 90.0,
                    _ => 45.0,
                };
                let spread = if base < 0.0 { 0.3 } else { 0.15 };
                (base - base.abs() * spread, base + base.abs() * spread)
            }
            Self::Flat => (40.0, 40.0),
        }
    }

    /// Regional load band in MW
    fn load_band(self, hour: u32) -> (f64, f64) {
        let base = match hour {
            0..=5 => 1800.0,
            6..=15 => 2300.0,
            16..=20 => 3000.0,
            _ => 2200.0,
        };
        if self == Self::Flat {
            (base, base)
        } else {
            (base * 0.95, base * 1.05)
        }
    }

    /// Emission rate band in lbs/MWh, lower while solar is on the margin
    fn moer_band(hour: u32) -> (f64, f64) {
        match hour {
            10..=15 => (600.0, 750.0),
            _ => (850.0, 1000.0),
        }
    }

    /// Generate `spec.days` days of data
    pub fn generate(self, spec: &SyntheticSpec) -> SyntheticMarket {
        let mut rng = ChaCha8Rng::seed_from_u64(spec.seed);
        let step = Duration::minutes(spec.step_minutes.max(1));
        let end = spec.start + Duration::days(i64::from(spec.days));
        let mut market = SyntheticMarket::default();

        let mut t = spec.start;
        while t < end {
            let hour = t.hour();
            let region = spec.region_id.as_str();
            market.signals.push(MarketSignal::new(
                region,
                t,
                SignalKind::Price,
                draw(&mut rng, self.price_band(hour)),
            ));
            market.signals.push(MarketSignal::new(
                region,
                t,
                SignalKind::Load,
                draw(&mut rng, self.load_band(hour)),
            ));
            market.signals.push(MarketSignal::new(
                region,
                t,
                SignalKind::Moer,
                draw(&mut rng, Self::moer_band(hour)),
            ));

            if t.minute() == 0 {
                self.issue_forecasts(&mut rng, spec, t, &mut market.forecasts);
            }
            t += step;
        }
        market
    }

    /// Hourly price and load forecast issued at `issued_at`
    fn issue_forecasts(
        self,
        rng: &mut ChaCha8Rng,
        spec: &SyntheticSpec,
        issued_at: DateTime<Utc>,
        forecasts: &mut Vec<ForecastRecord>,
    ) {
        for h in 0..FORECAST_HOURS {
            let target_hour = (issued_at + Duration::hours(h)).hour();
            let bands = [
                (SignalKind::PriceForecast, self.price_band(target_hour)),
                (SignalKind::LoadForecast, self.load_band(target_hour)),
            ];
            for (kind, (low, high)) in bands {
                let expected = (low + high) / 2.0;
                let error = if spec.forecast_noise > 0.0 {
                    rng.gen_range(-spec.forecast_noise..spec.forecast_noise)
                } else {
                    0.0
                };
                forecasts.push(ForecastRecord {
                    region_id: spec.region_id.clone(),
                    kind,
                    issued_at,
                    horizon_offset_secs: h * 3600,
                    value: expected + expected.abs() * error,
                });
            }
        }
    }
}

fn draw(rng: &mut ChaCha8Rng, (low, high): (f64, f64)) -> f64 {
    if high > low {
        rng.gen_range(low..high)
    } else {
        low
    }
}
