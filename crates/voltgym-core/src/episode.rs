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

//! Train/test partitioning of aligned frames into episode windows.
//!
//! A full episode of `steps` decisions spans `steps + 1` frames: the agent
//! acts on the first `steps` and observes the last. Training windows lie
//! entirely before `train_end`, in one valid run. Test windows tile every
//! valid run at or after `test_start` back to back, with a shorter final
//! window when the run length is not a multiple of `steps`, so the decision
//! timestamps of a run are each used exactly once.

use std::ops::Range;

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use voltgym_types::{BatteryParams, EpisodeConfig, InitialSocConfig, Split, SplitConfig};

use crate::alignment::AlignedRegion;

/// Frame range of one episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeWindow {
    /// Index of the first frame
    pub start: usize,
    /// Decisions in the episode
    pub steps: usize,
}

impl EpisodeWindow {
    /// Index of the terminal observation frame
    pub fn end(&self) -> usize {
        self.start + self.steps
    }
}

/// Candidate episodes of one region
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodePlan {
    train_starts: Vec<usize>,
    test_windows: Vec<EpisodeWindow>,
}

impl EpisodePlan {
    pub fn new(region: &AlignedRegion, split: &SplitConfig, steps: usize) -> Self {
        let frames = region.frames();
        let train_limit = frames.partition_point(|f| f.timestamp < split.train_end);
        let test_first = frames.partition_point(|f| f.timestamp < split.test_start);
        let full = steps + 1;

        let mut train_starts = Vec::new();
        let mut test_windows = Vec::new();

        for run in region.runs_with_at_least(full) {
            let train = run.start..run.end.min(train_limit);
            if train.len() >= full {
                train_starts.extend(train.start..=train.end - full);
            }

            let test = run.start.max(test_first)..run.end;
            if test.len() >= full {
                tile(test, steps, &mut test_windows);
            }
        }

        Self {
            train_starts,
            test_windows,
        }
    }

    /// First frames of every admissible training window
    pub fn train_starts(&self) -> &[usize] {
        &self.train_starts
    }

    /// Test windows in chronological order
    pub fn test_windows(&self) -> &[EpisodeWindow] {
        &self.test_windows
    }

    pub fn is_empty(&self, split: Split) -> bool {
        match split {
            Split::Train => self.train_starts.is_empty(),
            Split::Test => self.test_windows.is_empty(),
        }
    }

    /// Test windows as episode configurations of `region`
    pub fn test_episodes(&self, region: &AlignedRegion) -> Vec<EpisodeConfig> {
        self.test_windows
            .iter()
            .filter_map(|window| window_config(region, *window, Split::Test))
            .collect()
    }
}

/// Episode configuration covering `window` of `region`
pub fn window_config(
    region: &AlignedRegion,
    window: EpisodeWindow,
    split: Split,
) -> Option<EpisodeConfig> {
    let start = region.frame(window.start)?.timestamp;
    Some(EpisodeConfig::new(
        region.region_id(),
        start,
        window.steps,
        region.step(),
        split,
    ))
}

fn tile(run: Range<usize>, steps: usize, windows: &mut Vec<EpisodeWindow>) {
    // The last frame of a run is only ever observed
    let last_decision = run.end - 1;
    let mut start = run.start;
    while start < last_decision {
        let len = steps.min(last_decision - start);
        windows.push(EpisodeWindow { start, steps: len });
        start += len;
    }
}

/// Draw the initial SOC of a training episode, clamped into the SOC window
pub fn sample_initial_soc<R: Rng + ?Sized>(
    rng: &mut R,
    config: &InitialSocConfig,
    params: &BatteryParams,
) -> f64 {
    let soc = match *config {
        InitialSocConfig::Fixed { soc } => soc,
        InitialSocConfig::Uniform { low, high } => {
            if high > low {
                rng.gen_range(low..=high)
            } else {
                low
            }
        }
        InitialSocConfig::TruncatedNormal { mean, std } => truncated_normal(rng, mean, std),
    };
    params.clamp_soc(soc)
}

/// Normal sample truncated at one standard deviation
fn truncated_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    const MAX_ATTEMPTS: usize = 64;

    let Ok(normal) = Normal::new(mean, std) else {
        return mean;
    };
    if std <= 0.0 {
        return mean;
    }
    for _ in 0..MAX_ATTEMPTS {
        let sample = normal.sample(rng);
        if (sample - mean).abs() <= std {
            return sample;
        }
    }
    // Two thirds of draws land inside, so this is practically unreachable
    mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use voltgym_types::{AlignmentConfig, MarketSignal, SignalKind};

    use crate::alignment::align_region;
    use crate::store::TimeSeriesStore;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 10, 1, hour, minute, 0).unwrap()
    }

    /// Hourly frames 00:00..=`last_hour`, with the hours in `gaps` missing
    fn region(last_hour: u32, gaps: &[u32]) -> AlignedRegion {
        let signals = (0..=last_hour)
            .filter(|h| !gaps.contains(h))
            .flat_map(|h| {
                SignalKind::STATE_KINDS
                    .into_iter()
                    .map(move |kind| MarketSignal::new("SDGE", ts(h, 0), kind, f64::from(h)))
            })
            .collect();
        let store = TimeSeriesStore::from_records(signals, Vec::new()).unwrap();
        let config = AlignmentConfig {
            max_staleness_minutes: 0,
            ..AlignmentConfig::default()
        };
        align_region(&store, "SDGE", ts(0, 0), ts(last_hour, 0), Duration::hours(1), &config).unwrap()
    }

    fn split(train_end_hour: u32, test_start_hour: u32) -> SplitConfig {
        SplitConfig {
            train_end: ts(train_end_hour, 0),
            test_start: ts(test_start_hour, 0),
        }
    }

    #[test]
    fn test_train_starts_fit_before_boundary() {
        let region = region(23, &[]);
        let plan = EpisodePlan::new(&region, &split(10, 12), 4);

        // Frames 00..=09 are train; a 4-step window needs 5 frames
        assert_eq!(plan.train_starts(), &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_train_starts_skip_gaps() {
        let region = region(23, &[5]);
        let plan = EpisodePlan::new(&region, &split(12, 12), 3);

        // Run 00..=04 holds starts 0 and 1; run 06..=11 holds 6, 7 and 8
        assert_eq!(plan.train_starts(), &[0, 1, 6, 7, 8]);
    }

    #[test]
    fn test_test_windows_tile_held_out_runs() {
        let region = region(23, &[]);
        let plan = EpisodePlan::new(&region, &split(10, 12), 5);

        // Frames 12..=23: decisions at 12..=22 split into 5 + 5 + 1
        assert_eq!(
            plan.test_windows(),
            &[
                EpisodeWindow { start: 12, steps: 5 },
                EpisodeWindow { start: 17, steps: 5 },
                EpisodeWindow { start: 22, steps: 1 },
            ]
        );

        let episodes = plan.test_episodes(&region);
        assert_eq!(episodes[0].start_time, ts(12, 0));
        assert_eq!(episodes[0].end_time, ts(17, 0));
        assert_eq!(episodes[2].end_time, ts(23, 0));
        assert!(episodes.iter().all(|e| e.split == Split::Test));
    }

    #[test]
    fn test_short_runs_are_not_candidates() {
        let region = region(23, &[14]);
        let plan = EpisodePlan::new(&region, &split(12, 12), 4);

        // Run 12..=13 is too short for 5 frames; run 15..=23 tiles as 4 + 4
        assert_eq!(
            plan.test_windows(),
            &[
                EpisodeWindow { start: 15, steps: 4 },
                EpisodeWindow { start: 19, steps: 4 },
            ]
        );
    }

    #[test]
    fn test_no_train_window_when_pool_too_short() {
        let region = region(5, &[]);
        let plan = EpisodePlan::new(&region, &split(3, 3), 4);
        assert!(plan.is_empty(Split::Train));
        assert!(plan.is_empty(Split::Test));
    }

    #[test]
    fn test_initial_soc_always_within_bounds() {
        let params = BatteryParams {
            soc_min: 0.2,
            soc_max: 0.8,
            ..BatteryParams::default()
        };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let configs = [
            InitialSocConfig::Fixed { soc: 0.95 },
            InitialSocConfig::Uniform { low: 0.0, high: 1.0 },
            InitialSocConfig::TruncatedNormal { mean: 0.75, std: 0.2 },
        ];
        for config in &configs {
            for _ in 0..500 {
                let soc = sample_initial_soc(&mut rng, config, &params);
                assert!((0.2..=0.8).contains(&soc), "{config:?} produced {soc}");
            }
        }
    }

    #[test]
    fn test_truncated_normal_stays_within_one_sigma() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..1000 {
            let sample = truncated_normal(&mut rng, 0.6, 0.1);
            assert!((0.5 - 1e-12..=0.7 + 1e-12).contains(&sample));
        }
        assert_eq!(truncated_normal(&mut rng, 0.6, 0.0), 0.6);
    }
}
