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

//! Rollout simulator for VoltGym environments
//!
//! Runs baseline dispatch policies over synthetic scenarios, CSV exports or
//! SQLite archives, and reports rewards per policy.

pub mod cli;
pub mod commands;
pub mod policies;
pub mod runner;
pub mod scenarios;

pub use policies::{
    DispatchPolicy, ForecastArbitragePolicy, IdlePolicy, PriceThresholdPolicy, RandomPolicy,
    parse_policies,
};
pub use runner::{EpisodeSelection, EpisodeSummary, PolicyReport, StepRecord, evaluate_policies};
pub use scenarios::{MarketScenario, SyntheticMarket, SyntheticSpec};
