// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! CLI module for the rollout simulator command-line interface.

pub mod args;
pub mod config;
pub mod data_loaders;
pub mod formatters;

pub use args::{Cli, Commands, CompareArgs, CoverageArgs, DataSourceArgs, EnvArgs, RunArgs};
pub use config::build_env_config;
pub use data_loaders::{ArchiveLoader, CsvLoader, DataLoader, SyntheticLoader, load_store};
pub use formatters::{CsvFormatter, RankBy, TableFormatter};
