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

pub mod alignment;
pub mod archive;
pub mod battery;
pub mod config;
pub mod env;
pub mod episode;
pub mod error;
pub mod forecast;
pub mod ingest;
pub mod reward;
pub mod spaces;
pub mod store;
pub mod vec_env;

pub use alignment::{AlignedRegion, CoverageReport, align_region, align_regions, region_window};
pub use archive::SignalArchive;
pub use config::load_config;
pub use env::BatteryEnv;
pub use episode::{EpisodePlan, EpisodeWindow, sample_initial_soc};
pub use error::{
    ConfigurationError, DataGapError, EnvError, IngestionError, Result, VoltgymError,
};
pub use forecast::{
    ExternalForecaster, ForecastModel, Forecaster, IssuedForecastModel, OracleForecaster,
    PersistenceModel, build_forecaster,
};
pub use ingest::{load_forecasts, load_signals, parse_timestamp, read_forecasts, read_signals};
pub use reward::{RewardEvaluator, economics};
pub use spaces::{BoxSpace, MarketBounds};
pub use store::{ForecastIssue, StoreBuilder, TimeSeriesStore};
pub use vec_env::VecEnv;
