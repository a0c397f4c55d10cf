// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which pool an episode is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    /// Seeded random windows before the train boundary
    Train,
    /// Deterministic tiling of the held-out period
    Test,
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Train => f.write_str("train"),
            Self::Test => f.write_str("test"),
        }
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Self::Train),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown split '{other}' (expected train or test)")),
        }
    }
}

/// One episode window
///
/// `end_time` is the timestamp of the terminal observation, so the episode
/// takes `(end_time - start_time) / step_size` decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeConfig {
    pub region_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Simulation step in seconds
    pub step_secs: i64,
    pub split: Split,
}

impl EpisodeConfig {
    pub fn new(
        region_id: impl Into<String>,
        start_time: DateTime<Utc>,
        steps: usize,
        step_size: Duration,
        split: Split,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            start_time,
            end_time: start_time + step_size * steps as i32,
            step_secs: step_size.num_seconds(),
            split,
        }
    }

    pub fn step_size(&self) -> Duration {
        Duration::seconds(self.step_secs)
    }

    /// Number of decisions in the episode
    pub fn steps(&self) -> usize {
        if self.step_secs <= 0 || self.end_time <= self.start_time {
            return 0;
        }
        ((self.end_time - self.start_time).num_seconds() / self.step_secs) as usize
    }

    /// Timestamps at which the agent acts, `[start, end)`
    pub fn decision_times(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        let step = self.step_size();
        (0..self.steps()).map(move |i| self.start_time + step * i as i32)
    }
}

/// Lifecycle of an environment instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpisodePhase {
    Uninitialized,
    Ready,
    Running,
    Terminated,
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The configured number of steps was taken
    Horizon,
    /// The next frame is invalid or outside the aligned range
    DataGap,
}
