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

//! Gym-style battery dispatch environment.
//!
//! One [`BatteryEnv`] runs one episode at a time:
//! `Uninitialized -> Ready -> Running -> Terminated`, and back to `Ready` on
//! every reset. Aligned frames, episode plans and the forecaster are shared
//! read-only between forks of the same environment, see [`BatteryEnv::fork`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};
use voltgym_types::{
    AlignedFrame, AssetState, ConfigurationError, EnvConfig, EpisodeConfig, EpisodePhase,
    ForecastPoint, Observation, SignalKind, Split, StepInfo, TerminationReason, Transition,
};

use crate::alignment::{AlignedRegion, CoverageReport, align_regions, region_window};
use crate::battery;
use crate::episode::{EpisodePlan, EpisodeWindow, sample_initial_soc, window_config};
use crate::error::{EnvError, Result};
use crate::forecast::{Forecaster, build_forecaster};
use crate::reward::RewardEvaluator;
use crate::spaces::{BoxSpace, MarketBounds, action_space, observation_space};
use crate::store::TimeSeriesStore;

struct RegionData {
    aligned: AlignedRegion,
    plan: EpisodePlan,
}

/// Read-only state shared by all forks of an environment
struct Shared {
    config: EnvConfig,
    store: Arc<TimeSeriesStore>,
    regions: BTreeMap<String, RegionData>,
    evaluator: RewardEvaluator,
    bounds: MarketBounds,
}

impl Shared {
    fn region(&self, region_id: &str) -> std::result::Result<&RegionData, EnvError> {
        self.regions
            .get(region_id)
            .ok_or_else(|| EnvError::UnknownRegion(region_id.to_owned()))
    }
}

struct ActiveEpisode {
    config: EpisodeConfig,
    start: usize,
    steps: usize,
    taken: usize,
    state: AssetState,
    observation: Observation,
}

/// Battery dispatch environment over aligned market data
pub struct BatteryEnv {
    shared: Arc<Shared>,
    forecaster: Option<Arc<dyn Forecaster>>,
    phase: EpisodePhase,
    episode: Option<ActiveEpisode>,
    test_cursors: BTreeMap<String, usize>,
    /// Position of the first test episode handed out per region
    test_offset: usize,
    /// Unseeded resets use seed `seed_offset + seed_stride * episodes_started`
    seed_offset: u64,
    seed_stride: u64,
    episodes_started: u64,
}

impl BatteryEnv {
    /// Validate `config`, align the selected regions and plan their episodes
    pub fn new(store: Arc<TimeSeriesStore>, config: EnvConfig) -> Result<Self> {
        config.validate()?;

        let region_ids = if config.regions.is_empty() {
            store.regions()
        } else {
            config.regions.clone()
        };
        if region_ids.is_empty() {
            return Err(ConfigurationError::new("regions", "the store holds no regions").into());
        }

        let mut windows = Vec::with_capacity(region_ids.len());
        for region_id in &region_ids {
            let (start, end) = region_window(&store, region_id, &config.alignment)
                .ok_or_else(|| EnvError::UnknownRegion(region_id.clone()))?;
            windows.push((region_id.clone(), start, end));
        }

        let step = config.step_size();
        let aligned = align_regions(&store, &windows, step, &config.alignment)?;

        let forecaster = build_forecaster(
            &config.forecast,
            &store,
            step,
            config.alignment.max_staleness(),
            config.alignment.max_forecast_age(),
            config.deployment,
        )?
        .map(Arc::from);

        let mut regions = BTreeMap::new();
        for aligned in aligned {
            let plan = EpisodePlan::new(&aligned, &config.split, config.episode.steps);
            info!(
                "Region {}: {} train starts, {} test episodes",
                aligned.region_id(),
                plan.train_starts().len(),
                plan.test_windows().len()
            );
            if plan.is_empty(Split::Train) && plan.is_empty(Split::Test) {
                warn!(
                    "Region {} has no valid run of {} frames",
                    aligned.region_id(),
                    config.episode.steps + 1
                );
            }
            regions.insert(aligned.region_id().to_owned(), RegionData { aligned, plan });
        }

        let bounds = MarketBounds::from_store(&store, &region_ids);
        let evaluator = RewardEvaluator::new(config.reward.clone());

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                store,
                regions,
                evaluator,
                bounds,
            }),
            forecaster,
            phase: EpisodePhase::Uninitialized,
            episode: None,
            test_cursors: BTreeMap::new(),
            test_offset: 0,
            seed_offset: 0,
            seed_stride: 1,
            episodes_started: 0,
        })
    }

    /// Replace the configured forecaster
    ///
    /// Forecasts are fixed for the lifetime of an episode, so this fails once
    /// the environment has been reset. Oracle forecasters are rejected in
    /// deployment-style evaluation.
    pub fn with_forecaster(mut self, forecaster: Box<dyn Forecaster>) -> Result<Self> {
        if self.phase != EpisodePhase::Uninitialized {
            return Err(EnvError::ForecasterLocked.into());
        }
        if self.shared.config.deployment && forecaster.is_oracle() {
            return Err(ConfigurationError::new(
                "forecast.mode",
                format!(
                    "forecaster '{}' reads realized data and is not allowed in deployment-style evaluation",
                    forecaster.name()
                ),
            )
            .into());
        }
        self.forecaster = Some(Arc::from(forecaster));
        Ok(self)
    }

    /// Fresh environment sharing this one's aligned data and forecaster
    #[must_use]
    pub fn fork(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            forecaster: self.forecaster.clone(),
            phase: EpisodePhase::Uninitialized,
            episode: None,
            test_cursors: BTreeMap::new(),
            test_offset: 0,
            seed_offset: 0,
            seed_stride: 1,
            episodes_started: 0,
        }
    }

    /// Start test enumeration at the `offset`-th episode of each region
    pub(crate) fn set_test_offset(&mut self, offset: usize) {
        self.test_offset = offset;
    }

    /// Interleave unseeded train resets with `stride - 1` sibling forks
    pub(crate) fn set_seed_stream(&mut self, offset: u64, stride: u64) {
        self.seed_offset = offset;
        self.seed_stride = stride.max(1);
    }

    pub fn config(&self) -> &EnvConfig {
        &self.shared.config
    }

    pub fn store(&self) -> &Arc<TimeSeriesStore> {
        &self.shared.store
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    pub fn regions(&self) -> Vec<&str> {
        self.shared.regions.keys().map(String::as_str).collect()
    }

    pub fn aligned(&self, region_id: &str) -> Option<&AlignedRegion> {
        self.shared.regions.get(region_id).map(|data| &data.aligned)
    }

    pub fn coverage_reports(&self) -> Vec<CoverageReport> {
        self.shared
            .regions
            .values()
            .map(|data| data.aligned.report())
            .collect()
    }

    pub fn forecaster_name(&self) -> Option<&str> {
        self.forecaster.as_deref().map(Forecaster::name)
    }

    /// Window of the running or last finished episode
    pub fn current_episode(&self) -> Option<&EpisodeConfig> {
        self.episode.as_ref().map(|episode| &episode.config)
    }

    pub fn asset_state(&self) -> Option<&AssetState> {
        self.episode.as_ref().map(|episode| &episode.state)
    }

    /// Every test episode of a region, in the order resets hand them out
    pub fn test_episodes(&self, region_id: &str) -> std::result::Result<Vec<EpisodeConfig>, EnvError> {
        let data = self.shared.region(region_id)?;
        Ok(data.plan.test_episodes(&data.aligned))
    }

    /// Timestamps at which training episodes of a region may start
    pub fn train_starts(
        &self,
        region_id: &str,
    ) -> std::result::Result<Vec<DateTime<Utc>>, EnvError> {
        let data = self.shared.region(region_id)?;
        Ok(data
            .plan
            .train_starts()
            .iter()
            .filter_map(|idx| data.aligned.frame(*idx).map(|frame| frame.timestamp))
            .collect())
    }

    pub fn observation_space(&self) -> BoxSpace {
        let config = &self.shared.config;
        let mut kinds = config.alignment.forecast_kinds.clone();
        kinds.sort();
        kinds.dedup();
        let layout: Vec<(SignalKind, usize)> = kinds
            .into_iter()
            .map(|kind| (kind, config.alignment.forecast_horizon_steps))
            .collect();
        let forecast = self
            .forecaster
            .as_ref()
            .map(|forecaster| (forecaster.target(), config.forecast.horizon_steps));
        observation_space(&self.shared.bounds, &config.battery, &layout, forecast)
    }

    pub fn action_space(&self) -> BoxSpace {
        action_space(self.shared.config.action_scaling, &self.shared.config.battery)
    }

    /// Start the next episode of `split` in a region
    ///
    /// Train episodes draw their start frame and initial SOC from a ChaCha8
    /// generator seeded with `seed`; without a seed the environment uses its
    /// own episode counter, offset per fork inside a [`VecEnv`]. Test episodes
    /// ignore the seed: they walk the region's test windows in order and wrap
    /// around.
    ///
    /// [`VecEnv`]: crate::vec_env::VecEnv
    pub fn reset(&mut self, split: Split, region_id: &str, seed: Option<u64>) -> Result<Observation> {
        let seed = seed.unwrap_or_else(|| {
            self.seed_offset
                .wrapping_add(self.seed_stride.wrapping_mul(self.episodes_started))
        });
        let shared = Arc::clone(&self.shared);
        let data = shared.region(region_id)?;
        let settings = &shared.config.episode;

        let (window, soc) = match split {
            Split::Train => {
                let starts = data.plan.train_starts();
                if starts.is_empty() {
                    return Err(no_episodes(region_id, split));
                }
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let start = starts[rng.gen_range(0..starts.len())];
                let soc =
                    sample_initial_soc(&mut rng, &settings.train_initial_soc, &shared.config.battery);
                (
                    EpisodeWindow {
                        start,
                        steps: settings.steps,
                    },
                    soc,
                )
            }
            Split::Test => {
                let windows = data.plan.test_windows();
                if windows.is_empty() {
                    return Err(no_episodes(region_id, split));
                }
                let cursor = self
                    .test_cursors
                    .entry(region_id.to_owned())
                    .or_insert(self.test_offset % windows.len());
                let window = windows[*cursor];
                *cursor = (*cursor + 1) % windows.len();
                (window, settings.test_initial_soc)
            }
        };

        let config = window_config(&data.aligned, window, split)
            .ok_or_else(|| EnvError::InvalidWindow(format!("frame {} out of range", window.start)))?;
        Ok(self.begin(config, window, soc))
    }

    /// Start an explicit episode window
    ///
    /// The window must use the environment's step size, start on a valid
    /// aligned frame and stay on its side of the train/test split: every
    /// frame of a train window lies before `train_end`, a test window starts
    /// at or after `test_start`. Frames after the start are not checked for
    /// coverage: a gap ends the episode early like any other.
    pub fn reset_episode(&mut self, config: EpisodeConfig, seed: u64) -> Result<Observation> {
        let shared = Arc::clone(&self.shared);
        let data = shared.region(&config.region_id)?;
        let aligned = &data.aligned;

        if config.step_secs != aligned.step().num_seconds() {
            return Err(EnvError::InvalidWindow(format!(
                "step of {} s does not match the aligned step of {} s",
                config.step_secs,
                aligned.step().num_seconds()
            ))
            .into());
        }
        let steps = config.steps();
        if steps == 0 {
            return Err(EnvError::InvalidWindow(format!(
                "episode from {} to {} takes no step",
                config.start_time, config.end_time
            ))
            .into());
        }
        let split = &shared.config.split;
        match config.split {
            Split::Train if config.end_time >= split.train_end => {
                return Err(EnvError::InvalidWindow(format!(
                    "train episode ending at {} crosses the train boundary {}",
                    config.end_time, split.train_end
                ))
                .into());
            }
            Split::Test if config.start_time < split.test_start => {
                return Err(EnvError::InvalidWindow(format!(
                    "test episode starting at {} precedes the test boundary {}",
                    config.start_time, split.test_start
                ))
                .into());
            }
            _ => {}
        }
        let start = aligned.index_of(config.start_time).ok_or_else(|| {
            EnvError::InvalidWindow(format!("{} is not an aligned frame", config.start_time))
        })?;
        if !aligned.frame(start).is_some_and(AlignedFrame::is_valid) {
            return Err(EnvError::InvalidWindow(format!(
                "frame at {} lacks coverage",
                config.start_time
            ))
            .into());
        }

        let soc = match config.split {
            Split::Train => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                sample_initial_soc(
                    &mut rng,
                    &shared.config.episode.train_initial_soc,
                    &shared.config.battery,
                )
            }
            Split::Test => shared.config.episode.test_initial_soc,
        };
        Ok(self.begin(config, EpisodeWindow { start, steps }, soc))
    }

    fn begin(&mut self, config: EpisodeConfig, window: EpisodeWindow, soc: f64) -> Observation {
        let state = AssetState::new(soc, self.shared.config.battery.clone());
        let data = &self.shared.regions[&config.region_id];
        let frame = &data.aligned.frames()[window.start];
        let observation = observe(
            &self.shared,
            self.forecaster.as_deref(),
            &config.region_id,
            frame,
            0,
            &state,
        );

        debug!(
            region = %config.region_id,
            split = %config.split,
            start = %config.start_time,
            steps = window.steps,
            soc = state.soc,
            "Episode reset"
        );

        self.episodes_started += 1;
        self.episode = Some(ActiveEpisode {
            config,
            start: window.start,
            steps: window.steps,
            taken: 0,
            state,
            observation: observation.clone(),
        });
        self.phase = EpisodePhase::Ready;
        observation
    }

    /// Apply one action and advance the clock by one step
    pub fn step(&mut self, action: f64) -> std::result::Result<Transition, EnvError> {
        match self.phase {
            EpisodePhase::Uninitialized => return Err(EnvError::NotReset),
            EpisodePhase::Terminated => return Err(EnvError::EpisodeFinished),
            EpisodePhase::Ready | EpisodePhase::Running => {}
        }
        let shared = &self.shared;
        let episode = self.episode.as_mut().ok_or(EnvError::NotReset)?;
        let data = shared.region(&episode.config.region_id)?;
        let idx = episode.start + episode.taken;
        let frame = data
            .aligned
            .frame(idx)
            .ok_or_else(|| EnvError::InvalidWindow(format!("frame {idx} out of range")))?;

        let config = &shared.config;
        let power_kw = battery::requested_power(action, config.action_scaling, &config.battery);
        let prev = episode.state.clone();
        let (next_state, outcome) = battery::step(&prev, power_kw, config.step_hours());
        let reward = shared.evaluator.evaluate(&prev, &outcome, frame);

        episode.taken += 1;
        episode.state = next_state;

        let next_frame = data.aligned.frame(idx + 1).filter(|f| f.is_valid());
        let termination = if next_frame.is_none() {
            Some(TerminationReason::DataGap)
        } else if episode.taken >= episode.steps {
            Some(TerminationReason::Horizon)
        } else {
            None
        };
        if termination == Some(TerminationReason::DataGap) {
            warn!(
                "Episode in {} ended early after {} of {} steps: no valid frame after {}",
                episode.config.region_id, episode.taken, episode.steps, frame.timestamp
            );
        }

        // On a gap the final observation keeps the last valid market slice
        let next_observation = observe(
            shared,
            self.forecaster.as_deref(),
            &episode.config.region_id,
            next_frame.unwrap_or(frame),
            episode.taken,
            &episode.state,
        );

        trace!(
            step = episode.taken,
            action,
            realized_kw = outcome.realized_kw,
            soc = episode.state.soc,
            reward = reward.total,
            "Env step"
        );

        let done = termination.is_some();
        let observation = std::mem::replace(&mut episode.observation, next_observation.clone());
        self.phase = if done {
            EpisodePhase::Terminated
        } else {
            EpisodePhase::Running
        };

        Ok(Transition {
            observation,
            action,
            reward: reward.total,
            next_observation,
            done,
            info: StepInfo {
                requested_kw: outcome.requested_kw,
                realized_kw: outcome.realized_kw,
                grid_energy_kwh: outcome.grid_energy_kwh,
                infeasible: outcome.infeasible,
                reward,
                termination,
            },
        })
    }
}

impl std::fmt::Debug for BatteryEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatteryEnv")
            .field("regions", &self.regions())
            .field("forecaster", &self.forecaster_name())
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

fn no_episodes(region_id: &str, split: Split) -> crate::error::VoltgymError {
    EnvError::NoEpisodes {
        region_id: region_id.to_owned(),
        split,
    }
    .into()
}

fn observe(
    shared: &Shared,
    forecaster: Option<&dyn Forecaster>,
    region_id: &str,
    frame: &AlignedFrame,
    step: usize,
    state: &AssetState,
) -> Observation {
    let horizon = shared.config.forecast.horizon_steps;
    let forecast = forecaster
        .map(|forecaster| {
            forecast_slice(forecaster, region_id, frame, shared.config.step_size(), horizon)
        })
        .unwrap_or_default();

    Observation {
        timestamp: frame.timestamp,
        region_id: region_id.to_owned(),
        step,
        soc: state.soc,
        stored_energy_kwh: state.stored_energy_kwh(),
        load: frame.load,
        price: frame.price,
        moer: frame.moer,
        frame_forecasts: frame.forecast_horizon_values.clone(),
        forecast_target: forecaster.map(Forecaster::target),
        forecast,
    }
}

/// Forecast of exactly `horizon` points
///
/// A source that ends early is padded by persistence of its last value, or of
/// the current frame value when it produced nothing.
fn forecast_slice(
    forecaster: &dyn Forecaster,
    region_id: &str,
    frame: &AlignedFrame,
    step: Duration,
    horizon: usize,
) -> Vec<ForecastPoint> {
    let mut points: Vec<ForecastPoint> = forecaster
        .forecast(region_id, frame.timestamp, horizon)
        .take(horizon)
        .collect();
    let last = points.last().map_or_else(
        || frame.value(forecaster.target()).filter(|v| v.is_finite()).unwrap_or(0.0),
        |point| point.value,
    );
    for j in points.len() + 1..=horizon {
        points.push(ForecastPoint {
            timestamp: frame.timestamp + step * j as i32,
            value: last,
        });
    }
    points
}
