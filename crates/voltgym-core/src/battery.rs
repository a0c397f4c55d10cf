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

//! Battery dynamics.
//!
//! Sign convention: positive power charges the battery (grid import),
//! negative power discharges it (grid export). Charging stores
//! `p * charge_eff * h`; discharging removes `|p| / discharge_eff * h`.
//! Requests beyond the power limits or the SOC window are curtailed, never
//! rejected.

use voltgym_types::{ActionScaling, AssetState, BatteryParams, DispatchOutcome};

/// Tolerance below which curtailment is treated as numerical noise (kW)
const CURTAILMENT_EPSILON_KW: f64 = 1e-9;

/// Apply one power request for `step_hours`
///
/// Non-finite requests are treated as idle. The returned state always lies
/// within `[soc_min, soc_max]`.
pub fn step(state: &AssetState, action_kw: f64, step_hours: f64) -> (AssetState, DispatchOutcome) {
    let params = &state.params;
    let requested_kw = if action_kw.is_finite() { action_kw } else { 0.0 };

    if !(step_hours.is_finite() && step_hours > 0.0) {
        let outcome = DispatchOutcome {
            requested_kw,
            ..DispatchOutcome::idle()
        };
        return (state.clone(), outcome);
    }

    let mut realized_kw = requested_kw.clamp(-params.max_discharge_kw, params.max_charge_kw);

    if realized_kw > 0.0 {
        let headroom_kwh = ((params.soc_max - state.soc) * params.capacity_kwh).max(0.0);
        let max_kw = headroom_kwh / (params.charge_eff * step_hours);
        realized_kw = realized_kw.min(max_kw);
    } else if realized_kw < 0.0 {
        let available_kwh = ((state.soc - params.soc_min) * params.capacity_kwh).max(0.0);
        let max_kw = available_kwh * params.discharge_eff / step_hours;
        realized_kw = realized_kw.max(-max_kw);
    }

    let stored_delta_kwh = stored_delta(params, realized_kw, step_hours);
    let next_soc = params.clamp_soc(state.soc + stored_delta_kwh / params.capacity_kwh);

    let outcome = DispatchOutcome {
        requested_kw,
        realized_kw,
        stored_delta_kwh,
        grid_energy_kwh: realized_kw * step_hours,
        infeasible: (requested_kw - realized_kw).abs() > CURTAILMENT_EPSILON_KW,
    };
    let next = AssetState {
        soc: next_soc,
        params: params.clone(),
    };
    (next, outcome)
}

fn stored_delta(params: &BatteryParams, power_kw: f64, step_hours: f64) -> f64 {
    if power_kw >= 0.0 {
        power_kw * params.charge_eff * step_hours
    } else {
        power_kw / params.discharge_eff * step_hours
    }
}

/// Convert an agent action into a power request (kW)
pub fn requested_power(action: f64, scaling: ActionScaling, params: &BatteryParams) -> f64 {
    match scaling {
        ActionScaling::Kilowatts => action,
        ActionScaling::Normalized => {
            let action = action.clamp(-1.0, 1.0);
            if action >= 0.0 {
                action * params.max_charge_kw
            } else {
                action * params.max_discharge_kw
            }
        }
    }
}
