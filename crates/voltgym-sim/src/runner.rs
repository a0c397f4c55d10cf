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

//! Policy rollouts over environment episodes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use voltgym_core::BatteryEnv;
use voltgym_types::{ActionScaling, BatteryParams, Observation, Split, TerminationReason};

use crate::policies::DispatchPolicy;

/// One environment step as seen by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub policy: String,
    pub region_id: String,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub soc: f64,
    pub requested_kw: f64,
    pub realized_kw: f64,
    pub grid_energy_kwh: f64,
    pub reward: f64,
    pub infeasible: bool,
}

/// Totals of one finished episode
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeSummary {
    pub policy: String,
    pub region_id: String,
    pub split: Split,
    pub start: DateTime<Utc>,
    pub steps: usize,
    pub total_reward: f64,
    pub economic: f64,
    pub emissions: f64,
    pub infeasibility: f64,
    pub charged_kwh: f64,
    pub discharged_kwh: f64,
    pub infeasible_steps: usize,
    pub final_soc: f64,
    pub termination: Option<TerminationReason>,
    #[serde(skip)]
    pub records: Vec<StepRecord>,
}

/// All episodes one policy ran
#[derive(Debug, Clone)]
pub struct PolicyReport {
    pub policy_id: String,
    pub policy_name: String,
    pub episodes: Vec<EpisodeSummary>,
}

impl PolicyReport {
    pub fn total_reward(&self) -> f64 {
        self.episodes.iter().map(|e| e.total_reward).sum()
    }

    pub fn mean_reward(&self) -> f64 {
        if self.episodes.is_empty() {
            0.0
        } else {
            self.total_reward() / self.episodes.len() as f64
        }
    }

    pub fn economic(&self) -> f64 {
        self.episodes.iter().map(|e| e.economic).sum()
    }

    pub fn emissions(&self) -> f64 {
        self.episodes.iter().map(|e| e.emissions).sum()
    }

    pub fn steps(&self) -> usize {
        self.episodes.iter().map(|e| e.steps).sum()
    }

    pub fn infeasible_steps(&self) -> usize {
        self.episodes.iter().map(|e| e.infeasible_steps).sum()
    }

    /// Equivalent full cycles, counted on discharged energy
    pub fn cycles(&self, capacity_kwh: f64) -> f64 {
        if capacity_kwh <= 0.0 {
            return 0.0;
        }
        self.episodes.iter().map(|e| e.discharged_kwh).sum::<f64>() / capacity_kwh
    }
}

/// Which episodes a rollout covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeSelection {
    /// Every test episode of each region, in order
    Test,
    /// Seeded training episodes, seeds `base_seed..base_seed + episodes`
    /// wrapping at `u64::MAX`
    Train { episodes: usize, base_seed: u64 },
}

/// Convert a power request into the environment's action convention
pub fn to_action(power_kw: f64, scaling: ActionScaling, params: &BatteryParams) -> f64 {
    match scaling {
        ActionScaling::Kilowatts => power_kw,
        ActionScaling::Normalized => {
            let limit = if power_kw >= 0.0 {
                params.max_charge_kw
            } else {
                params.max_discharge_kw
            };
            if limit > 0.0 { power_kw / limit } else { 0.0 }
        }
    }
}

/// Run a reset environment until its episode ends
pub fn run_episode(
    env: &mut BatteryEnv,
    policy: &mut dyn DispatchPolicy,
    first: Observation,
) -> Result<EpisodeSummary> {
    let episode = env
        .current_episode()
        .cloned()
        .context("Environment was not reset before the rollout")?;
    let params = env.config().battery.clone();
    let scaling = env.config().action_scaling;
    let step_hours = env.config().step_hours();

    let mut summary = EpisodeSummary {
        policy: policy.id().to_owned(),
        region_id: episode.region_id.clone(),
        split: episode.split,
        start: episode.start_time,
        steps: 0,
        total_reward: 0.0,
        economic: 0.0,
        emissions: 0.0,
        infeasibility: 0.0,
        charged_kwh: 0.0,
        discharged_kwh: 0.0,
        infeasible_steps: 0,
        final_soc: first.soc,
        termination: None,
        records: Vec::new(),
    };

    let mut observation = first;
    loop {
        let power_kw = policy.act(&observation, &params);
        let transition = env.step(to_action(power_kw, scaling, &params))?;
        let info = &transition.info;

        summary.steps += 1;
        summary.total_reward += transition.reward;
        summary.economic += info.reward.economic;
        summary.emissions += info.reward.emissions;
        summary.infeasibility += info.reward.infeasibility;
        if info.realized_kw > 0.0 {
            summary.charged_kwh += info.realized_kw * step_hours;
        } else {
            summary.discharged_kwh -= info.realized_kw * step_hours;
        }
        if info.infeasible {
            summary.infeasible_steps += 1;
        }
        summary.records.push(StepRecord {
            policy: summary.policy.clone(),
            region_id: summary.region_id.clone(),
            timestamp: observation.timestamp,
            price: observation.price,
            soc: transition.next_observation.soc,
            requested_kw: info.requested_kw,
            realized_kw: info.realized_kw,
            grid_energy_kwh: info.grid_energy_kwh,
            reward: transition.reward,
            infeasible: info.infeasible,
        });

        summary.final_soc = transition.next_observation.soc;
        if transition.done {
            summary.termination = info.termination;
            break;
        }
        observation = transition.next_observation;
    }

    debug!(
        policy = %summary.policy,
        region = %summary.region_id,
        steps = summary.steps,
        reward = summary.total_reward,
        "Episode finished"
    );
    Ok(summary)
}

/// Roll one policy out over the selected episodes of each region
pub fn evaluate_policy(
    env: &mut BatteryEnv,
    policy: &mut dyn DispatchPolicy,
    region_ids: &[String],
    selection: EpisodeSelection,
) -> Result<PolicyReport> {
    let mut episodes = Vec::new();
    for region_id in region_ids {
        match selection {
            EpisodeSelection::Test => {
                let windows = env.test_episodes(region_id)?;
                for (i, window) in windows.into_iter().enumerate() {
                    policy.reset(i as u64);
                    let first = env.reset_episode(window, i as u64)?;
                    episodes.push(run_episode(env, policy, first)?);
                }
            }
            EpisodeSelection::Train {
                episodes: count,
                base_seed,
            } => {
                for i in 0..count as u64 {
                    let seed = base_seed.wrapping_add(i);
                    policy.reset(seed);
                    let first = env
                        .reset(Split::Train, region_id, Some(seed))
                        .with_context(|| format!("Failed to reset training episode in {region_id}"))?;
                    episodes.push(run_episode(env, policy, first)?);
                }
            }
        }
    }

    Ok(PolicyReport {
        policy_id: policy.id().to_owned(),
        policy_name: policy.name().to_owned(),
        episodes,
    })
}

/// Evaluate several policies in parallel, each on its own fork of `env`
///
/// Reports come back in the order of `policies`.
pub fn evaluate_policies(
    env: &BatteryEnv,
    policies: Vec<Box<dyn DispatchPolicy>>,
    region_ids: &[String],
    selection: EpisodeSelection,
) -> Result<Vec<PolicyReport>> {
    info!(
        "Evaluating {} policies over {} regions",
        policies.len(),
        region_ids.len()
    );
    policies
        .into_par_iter()
        .map(|mut policy| {
            let mut fork = env.fork();
            evaluate_policy(&mut fork, policy.as_mut(), region_ids, selection)
        })
        .collect()
}
