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

use tracing::trace;
use voltgym_types::{AlignedFrame, AssetState, DispatchOutcome, RewardBreakdown, RewardConfig};

/// Turns a dispatch outcome and the market slice into a reward
///
/// The evaluator has no failure path: non-finite intermediate terms are
/// replaced with zero.
#[derive(Debug, Clone)]
pub struct RewardEvaluator {
    config: RewardConfig,
}

impl RewardEvaluator {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Reward of the step that moved the battery away from `prev`
    pub fn evaluate(
        &self,
        prev: &AssetState,
        outcome: &DispatchOutcome,
        market: &AlignedFrame,
    ) -> RewardBreakdown {
        let price_per_kwh = market.price * self.config.price_unit.per_kwh_factor();
        let moer_per_kwh = market.moer * self.config.moer_unit.per_kwh_factor();

        let economic = finite_or_zero(economics::energy_value(
            outcome.grid_energy_kwh,
            price_per_kwh,
        ));
        let emissions = finite_or_zero(
            -self.config.emissions_weight * economics::emissions(outcome.grid_energy_kwh, moer_per_kwh),
        );
        let infeasibility =
            finite_or_zero(-self.config.infeasibility_weight * outcome.curtailed_kw());
        let total = self.config.economic_weight * economic + emissions + infeasibility;

        trace!(
            soc = prev.soc,
            realized_kw = outcome.realized_kw,
            economic,
            emissions,
            infeasibility,
            "Step reward"
        );

        RewardBreakdown {
            economic,
            emissions,
            infeasibility,
            total: finite_or_zero(total),
        }
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Helper functions for reward terms
pub mod economics {
    /// Revenue of a grid exchange
    ///
    /// `grid_energy_kwh` is positive when importing, so imports cost money and
    /// exports earn it.
    pub fn energy_value(grid_energy_kwh: f64, price_per_kwh: f64) -> f64 {
        -grid_energy_kwh * price_per_kwh
    }

    /// Emissions caused by a grid exchange, negative for exports
    pub fn emissions(grid_energy_kwh: f64, moer_per_kwh: f64) -> f64 {
        grid_energy_kwh * moer_per_kwh
    }
}
