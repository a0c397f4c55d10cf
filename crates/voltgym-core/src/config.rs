// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Loading of environment configuration files

use std::path::Path;

use tracing::info;
use voltgym_types::EnvConfig;

use crate::error::{Result, VoltgymError};

/// Read and validate an [`EnvConfig`]
///
/// Files ending in `.json` are parsed as JSON, anything else as TOML.
pub fn load_config(path: &Path) -> Result<EnvConfig> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let parse_error = |reason: String| VoltgymError::ConfigParse {
        path: path.display().to_string(),
        reason,
    };
    let config: EnvConfig = if is_json {
        serde_json::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
    } else {
        toml::from_str(&contents).map_err(|e| parse_error(e.to_string()))?
    };

    config.validate()?;
    info!(
        "Loaded configuration from {} ({} steps of {} min)",
        path.display(),
        config.episode.steps,
        config.episode.step_minutes
    );
    Ok(config)
}
