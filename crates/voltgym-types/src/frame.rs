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

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::signal::SignalKind;

/// Whether a frame may be used by an episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FrameValidity {
    Valid,
    /// Kinds without usable coverage at this timestamp
    Invalid { missing: Vec<SignalKind> },
}

/// One row of the simulation clock for a region
///
/// Fields of missing kinds hold `NaN` and the frame is marked invalid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedFrame {
    pub timestamp: DateTime<Utc>,
    pub load: f64,
    pub price: f64,
    pub moer: f64,
    /// Issued forecast values at `timestamp + j * step` for `j = 1..=horizon`
    pub forecast_horizon_values: BTreeMap<SignalKind, Vec<f64>>,
    pub validity: FrameValidity,
}

impl AlignedFrame {
    pub fn is_valid(&self) -> bool {
        matches!(self.validity, FrameValidity::Valid)
    }

    /// State-like value of `kind`, `None` for forecast kinds
    pub fn value(&self, kind: SignalKind) -> Option<f64> {
        match kind {
            SignalKind::Load => Some(self.load),
            SignalKind::Price => Some(self.price),
            SignalKind::Moer => Some(self.moer),
            _ => None,
        }
    }

    pub fn missing_kinds(&self) -> &[SignalKind] {
        match &self.validity {
            FrameValidity::Valid => &[],
            FrameValidity::Invalid { missing } => missing,
        }
    }
}
