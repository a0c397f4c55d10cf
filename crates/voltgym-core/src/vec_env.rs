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

use voltgym_types::{EpisodePhase, Observation, Split, Transition};

use crate::env::BatteryEnv;
use crate::error::{EnvError, Result};

/// Independent environments over the same aligned data
///
/// Environment `i` starts its test enumeration at the `i`-th episode of each
/// region, so a batch of test resets covers distinct windows. Unseeded train
/// resets of environment `i` use seeds `i, i + n, i + 2n, ...`, so no two
/// environments of a batch of `n` draw from the same seed.
#[derive(Debug)]
pub struct VecEnv {
    envs: Vec<BatteryEnv>,
}

impl VecEnv {
    pub fn new(env: BatteryEnv, num_envs: usize) -> Self {
        let mut envs = Vec::with_capacity(num_envs);
        for i in 0..num_envs {
            let mut fork = env.fork();
            fork.set_test_offset(i);
            fork.set_seed_stream(i as u64, num_envs as u64);
            envs.push(fork);
        }
        Self { envs }
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn env(&self, idx: usize) -> Option<&BatteryEnv> {
        self.envs.get(idx)
    }

    pub fn envs(&self) -> &[BatteryEnv] {
        &self.envs
    }

    /// Reset every environment
    ///
    /// Environment `i` uses `seeds[i]` when given, else its own counter.
    pub fn reset_all(
        &mut self,
        split: Split,
        region_id: &str,
        seeds: Option<&[u64]>,
    ) -> Result<Vec<Observation>> {
        self.envs
            .iter_mut()
            .enumerate()
            .map(|(i, env)| {
                let seed = seeds.and_then(|s| s.get(i).copied());
                env.reset(split, region_id, seed)
            })
            .collect()
    }

    /// Step every environment with its own action
    pub fn step_all(&mut self, actions: &[f64]) -> std::result::Result<Vec<Transition>, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::ActionCount {
                expected: self.envs.len(),
                actual: actions.len(),
            });
        }
        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(*action))
            .collect()
    }

    /// Whether every environment has finished its episode
    pub fn all_done(&self) -> bool {
        self.envs
            .iter()
            .all(|env| env.phase() == EpisodePhase::Terminated)
    }
}
