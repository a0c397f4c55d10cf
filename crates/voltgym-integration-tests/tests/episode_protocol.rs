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
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::sync::Arc;
use voltgym_core::{BatteryEnv, EnvError, TimeSeriesStore, VecEnv, VoltgymError};
use voltgym_integration_tests::{daily_price, hour, hourly_config, hourly_signals, hourly_store};
use voltgym_types::{EpisodeConfig, SignalKind, Split, TerminationReason, Transition};

/// Four days of hourly data with the price of hour 70 missing
fn gapped_store() -> Arc<TimeSeriesStore> {
    let signals = hourly_signals("SDGE", 0..96, daily_price)
        .into_iter()
        .filter(|s| !(s.kind == SignalKind::Price && s.timestamp == hour(70)))
        .collect();
    Arc::new(TimeSeriesStore::from_records(signals, Vec::new()).unwrap())
}

fn rollout(env: &mut BatteryEnv, seed: u64, action_seed: u64) -> Vec<Transition> {
    let mut rng = ChaCha8Rng::seed_from_u64(action_seed);
    env.reset(Split::Train, "SDGE", Some(seed)).unwrap();
    let mut transitions = Vec::new();
    loop {
        let transition = env.step(rng.gen_range(-20.0..20.0)).unwrap();
        let done = transition.done;
        transitions.push(transition);
        if done {
            return transitions;
        }
    }
}

#[test]
fn test_same_seed_same_episode() {
    let store = hourly_store("SDGE", 4, daily_price);
    let mut a = BatteryEnv::new(Arc::clone(&store), hourly_config(72, 12)).unwrap();
    let mut b = BatteryEnv::new(store, hourly_config(72, 12)).unwrap();

    for seed in [0, 1, 42, 9999] {
        assert_eq!(rollout(&mut a, seed, seed + 1), rollout(&mut b, seed, seed + 1));
    }

    let mut fork = a.fork();
    assert_eq!(rollout(&mut a, 5, 5), rollout(&mut fork, 5, 5));
}

#[test]
fn test_seeds_spread_over_the_train_pool() {
    let mut env = BatteryEnv::new(hourly_store("SDGE", 4, daily_price), hourly_config(72, 12)).unwrap();
    let starts: BTreeSet<DateTime<Utc>> = (0..40)
        .map(|seed| env.reset(Split::Train, "SDGE", Some(seed)).unwrap().timestamp)
        .collect();
    assert!(starts.len() > 1);

    let pool: BTreeSet<DateTime<Utc>> = env.train_starts("SDGE").unwrap().into_iter().collect();
    assert!(starts.is_subset(&pool));
}

#[test]
fn test_test_episodes_tile_every_valid_decision() {
    let env = BatteryEnv::new(gapped_store(), hourly_config(48, 6)).unwrap();
    let episodes = env.test_episodes("SDGE").unwrap();

    let decisions: Vec<DateTime<Utc>> = episodes
        .iter()
        .flat_map(|episode| episode.decision_times().collect::<Vec<_>>())
        .collect();
    let unique: BTreeSet<DateTime<Utc>> = decisions.iter().copied().collect();
    assert_eq!(unique.len(), decisions.len(), "test episodes overlap");

    // Hour 70 is invalid: the run before it ends one decision early
    let expected: BTreeSet<DateTime<Utc>> = (48..69).chain(71..95).map(hour).collect();
    assert_eq!(unique, expected);

    let lengths: Vec<usize> = episodes.iter().map(|e| e.steps()).collect();
    assert_eq!(lengths, vec![6, 6, 6, 3, 6, 6, 6, 6]);
}

#[test]
fn test_test_episodes_run_to_their_horizon() {
    let mut env = BatteryEnv::new(gapped_store(), hourly_config(48, 6)).unwrap();
    for (i, episode) in env.test_episodes("SDGE").unwrap().into_iter().enumerate() {
        let steps = episode.steps();
        let first = env.reset_episode(episode, i as u64).unwrap();
        assert_eq!(first.soc, 0.6);

        let mut taken = 0;
        loop {
            let transition = env.step(0.0).unwrap();
            taken += 1;
            if transition.done {
                assert_eq!(transition.info.termination, Some(TerminationReason::Horizon));
                break;
            }
        }
        assert_eq!(taken, steps);
        assert_eq!(env.step(0.0).unwrap_err(), EnvError::EpisodeFinished);
    }
}

#[test]
fn test_no_temporal_leakage() {
    let mut config = hourly_config(0, 12);
    config.split.train_end = hour(40);
    config.split.test_start = hour(48);
    let mut env = BatteryEnv::new(hourly_store("SDGE", 4, daily_price), config).unwrap();

    for seed in 0..50 {
        for transition in rollout(&mut env, seed, seed) {
            assert!(transition.observation.timestamp < hour(40));
            assert!(transition.next_observation.timestamp < hour(40));
        }
    }

    for episode in env.test_episodes("SDGE").unwrap() {
        assert!(episode.start_time >= hour(48));
        env.reset_episode(episode, 0).unwrap();
        loop {
            let transition = env.step(3.0).unwrap();
            assert!(transition.observation.timestamp >= hour(48));
            if transition.done {
                break;
            }
        }
    }
}

#[test]
fn test_explicit_windows_cannot_cross_the_split() {
    let mut config = hourly_config(0, 12);
    config.split.train_end = hour(48);
    config.split.test_start = hour(48);
    let mut env = BatteryEnv::new(hourly_store("SDGE", 4, daily_price), config).unwrap();
    let window = |start, steps, split| EpisodeConfig::new("SDGE", hour(start), steps, Duration::hours(1), split);

    for leaking in [
        window(60, 6, Split::Train),
        window(44, 6, Split::Train),
        window(30, 6, Split::Test),
    ] {
        match env.reset_episode(leaking, 0) {
            Err(VoltgymError::Env(EnvError::InvalidWindow(_))) => {}
            other => panic!("expected an invalid window, got {other:?}"),
        }
    }

    env.reset_episode(window(41, 6, Split::Train), 0).unwrap();
    loop {
        let transition = env.step(1.0).unwrap();
        assert!(transition.next_observation.timestamp < hour(48));
        if transition.done {
            break;
        }
    }
}

#[test]
fn test_unseeded_vec_env_train_resets_differ() {
    let env = BatteryEnv::new(hourly_store("SDGE", 4, daily_price), hourly_config(72, 12)).unwrap();
    let mut vec_env = VecEnv::new(env, 4);

    let first = vec_env.reset_all(Split::Train, "SDGE", None).unwrap();
    let distinct: BTreeSet<(DateTime<Utc>, u64)> =
        first.iter().map(|o| (o.timestamp, o.soc.to_bits())).collect();
    assert_eq!(distinct.len(), 4);
}

#[test]
fn test_vec_env_batches_distinct_test_windows() {
    let env = BatteryEnv::new(hourly_store("SDGE", 4, daily_price), hourly_config(48, 12)).unwrap();
    let mut vec_env = VecEnv::new(env, 3);

    let first = vec_env.reset_all(Split::Test, "SDGE", None).unwrap();
    let starts: BTreeSet<DateTime<Utc>> = first.iter().map(|o| o.timestamp).collect();
    assert_eq!(starts.len(), 3);

    let transitions = vec_env.step_all(&[1.0, 0.0, -1.0]).unwrap();
    assert_eq!(transitions.len(), 3);
    assert!(transitions[0].next_observation.soc > transitions[1].next_observation.soc);
    assert!(transitions[2].next_observation.soc < transitions[1].next_observation.soc);

    assert_eq!(
        vec_env.step_all(&[0.0]).unwrap_err(),
        EnvError::ActionCount {
            expected: 3,
            actual: 1
        }
    );
}
