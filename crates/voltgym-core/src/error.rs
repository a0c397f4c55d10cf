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

//! Error types for the simulation core

use chrono::{DateTime, Utc};
use thiserror::Error;
use voltgym_types::{SignalKind, Split};

pub use voltgym_types::ConfigurationError;

/// Malformed or duplicate raw records, reported before anything is stored
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    /// `row` is the 1-based index of the data row (header excluded)
    #[error("row {row}: {reason}")]
    MalformedRow { row: usize, reason: String },

    #[error("row {row}: duplicate {kind} record for region {region_id} at {timestamp}")]
    Duplicate {
        row: usize,
        region_id: String,
        kind: SignalKind,
        timestamp: DateTime<Utc>,
    },
}

/// A requested alignment window has no valid coverage at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no valid {kind} coverage for region {region_id} between {start} and {end}")]
pub struct DataGapError {
    pub region_id: String,
    pub kind: SignalKind,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Misuse of the environment API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    #[error("step called before reset")]
    NotReset,

    #[error("episode already finished, reset before stepping again")]
    EpisodeFinished,

    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    #[error("no {split} episodes available for region {region_id}")]
    NoEpisodes { region_id: String, split: Split },

    #[error("invalid episode window: {0}")]
    InvalidWindow(String),

    #[error("the forecaster can only be replaced before the first reset")]
    ForecasterLocked,

    #[error("expected {expected} actions, got {actual}")]
    ActionCount { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum VoltgymError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    DataGap(#[from] DataGapError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("failed to parse {path}: {reason}")]
    ConfigParse { path: String, reason: String },

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("archive error: {0}")]
    Archive(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoltgymError>;
