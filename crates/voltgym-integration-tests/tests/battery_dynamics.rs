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

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use voltgym_core::{BatteryEnv, battery};
use voltgym_integration_tests::{daily_price, hourly_config, hourly_store};
use voltgym_types::{ActionScaling, AssetState, BatteryParams, InitialSocConfig, Split};

const EPS: f64 = 1e-9;

fn small_battery() -> BatteryParams {
    BatteryParams {
        capacity_kwh: 10.0,
        soc_min: 0.1,
        soc_max: 0.9,
        charge_eff: 0.95,
        discharge_eff: 0.95,
        max_charge_kw: 15.0,
        max_discharge_kw: 15.0,
    }
}

fn env_with(params: BatteryParams, price: fn(i64) -> f64) -> BatteryEnv {
    let mut config = hourly_config(24, 6);
    config.battery = params;
    config.episode.test_initial_soc = 0.5;
    config.episode.train_initial_soc = InitialSocConfig::Fixed { soc: 0.5 };
    BatteryEnv::new(hourly_store("SDGE", 2, price), config).unwrap()
}

#[test]
fn test_overcharge_is_clipped_at_soc_max() {
    // 5 kW for one hour would store 4.75 kWh; only 4 kWh of headroom remain
    let (next, outcome) = battery::step(&AssetState::new(0.5, small_battery()), 5.0, 1.0);
    assert!((next.soc - 0.9).abs() < EPS);
    assert!((outcome.realized_kw - 4.0 / 0.95).abs() < EPS);
    assert!((outcome.stored_delta_kwh - 4.0).abs() < EPS);
    assert!(outcome.infeasible);

    let mut env = env_with(small_battery(), |_| 40.0);
    let first = env.reset(Split::Test, "SDGE", None).unwrap();
    assert!((first.soc - 0.5).abs() < EPS);

    let transition = env.step(5.0).unwrap();
    assert!((transition.next_observation.soc - 0.9).abs() < EPS);
    assert!((transition.info.realized_kw - 4.0 / 0.95).abs() < EPS);
    assert_eq!(transition.info.requested_kw, 5.0);
    assert!(transition.info.infeasible);
    assert!(!transition.done, "curtailment never ends an episode");
}

#[test]
fn test_discharge_earns_price_times_energy() {
    // $50/MWh, 2 kW exported for one hour
    let mut env = env_with(small_battery(), |_| 50.0);
    env.reset(Split::Test, "SDGE", None).unwrap();

    let transition = env.step(-2.0).unwrap();
    assert!((transition.info.realized_kw + 2.0).abs() < EPS);
    assert!((transition.info.reward.economic - 0.10).abs() < EPS);
    assert!((transition.reward - 0.10).abs() < EPS);
    assert!(!transition.info.infeasible);

    let expected_soc = 0.5 - 2.0 / 0.95 / 10.0;
    assert!((transition.next_observation.soc - expected_soc).abs() < EPS);
}

#[test]
fn test_soc_stays_in_bounds_under_random_actions() {
    let params = small_battery();
    let mut env = env_with(params.clone(), daily_price);
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    for seed in 0..20 {
        let mut observation = env.reset(Split::Train, "SDGE", Some(seed)).unwrap();
        loop {
            assert!(observation.soc >= params.soc_min - EPS);
            assert!(observation.soc <= params.soc_max + EPS);
            assert!((observation.stored_energy_kwh - observation.soc * 10.0).abs() < EPS);

            let action = rng.gen_range(-60.0..60.0);
            let transition = env.step(action).unwrap();
            assert!(transition.info.realized_kw.abs() <= 15.0 + EPS);
            if transition.done {
                break;
            }
            observation = transition.next_observation;
        }
    }
}

#[test]
fn test_non_finite_action_is_idle() {
    let mut env = env_with(small_battery(), |_| 40.0);
    env.reset(Split::Test, "SDGE", None).unwrap();

    let transition = env.step(f64::NAN).unwrap();
    assert_eq!(transition.info.realized_kw, 0.0);
    assert!((transition.next_observation.soc - 0.5).abs() < EPS);
    assert_eq!(transition.reward, 0.0);
}

#[test]
fn test_normalized_actions_scale_to_power_limits() {
    let params = BatteryParams {
        max_charge_kw: 4.0,
        max_discharge_kw: 2.0,
        ..small_battery()
    };
    let mut config = hourly_config(24, 6);
    config.battery = params;
    config.action_scaling = ActionScaling::Normalized;
    config.episode.test_initial_soc = 0.5;
    let mut env = BatteryEnv::new(hourly_store("SDGE", 2, |_| 40.0), config).unwrap();
    env.reset(Split::Test, "SDGE", None).unwrap();

    let charge = env.step(0.5).unwrap();
    assert!((charge.info.requested_kw - 2.0).abs() < EPS);

    let discharge = env.step(-3.0).unwrap();
    assert!((discharge.info.requested_kw + 2.0).abs() < EPS);
    assert_eq!(discharge.action, -3.0);
}
