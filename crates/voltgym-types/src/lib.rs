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

pub mod asset;
pub mod config;
pub mod episode;
pub mod frame;
pub mod observation;
pub mod signal;

// Re-export common types for convenience
pub use asset::{AssetState, BatteryParams, DispatchOutcome};
pub use config::{
    ActionScaling, AlignmentConfig, ConfigurationError, EnvConfig, EpisodeSettings, ForecastConfig,
    ForecastMode, InitialSocConfig, PriceUnit, RewardConfig, SplitConfig,
};
pub use episode::{EpisodeConfig, EpisodePhase, Split, TerminationReason};
pub use frame::{AlignedFrame, FrameValidity};
pub use observation::{
    ForecastPoint, Observation, RewardBreakdown, StepInfo, Transition, feature_labels,
};
pub use signal::{ForecastRecord, MarketSignal, SignalKind};
