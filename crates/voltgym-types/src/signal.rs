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

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of market or physical signal carried by a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Regional load (MW)
    Load,
    /// Issued load forecast (MW)
    LoadForecast,
    /// Locational marginal price
    Price,
    /// Issued price forecast
    PriceForecast,
    /// Marginal operating emissions rate
    Moer,
    /// Issued solar generation forecast (MW)
    SolarForecast,
    /// Issued wind generation forecast (MW)
    WindForecast,
}

impl SignalKind {
    /// Series that are aligned with last-observation-carried-forward
    pub const STATE_KINDS: [SignalKind; 3] = [SignalKind::Load, SignalKind::Price, SignalKind::Moer];

    pub const ALL: [SignalKind; 7] = [
        SignalKind::Load,
        SignalKind::LoadForecast,
        SignalKind::Price,
        SignalKind::PriceForecast,
        SignalKind::Moer,
        SignalKind::SolarForecast,
        SignalKind::WindForecast,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::LoadForecast => "load_forecast",
            Self::Price => "price",
            Self::PriceForecast => "price_forecast",
            Self::Moer => "moer",
            Self::SolarForecast => "solar_forecast",
            Self::WindForecast => "wind_forecast",
        }
    }

    /// Whether this kind is delivered as issued forecast vectors
    pub fn is_forecast(self) -> bool {
        matches!(
            self,
            Self::LoadForecast | Self::PriceForecast | Self::SolarForecast | Self::WindForecast
        )
    }

    /// The state-like series a forecast kind predicts, if any
    pub fn forecast_target(self) -> Option<SignalKind> {
        match self {
            Self::LoadForecast => Some(Self::Load),
            Self::PriceForecast => Some(Self::Price),
            _ => None,
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        // Accept the column names used by the CAISO exports as aliases
        match normalized.as_str() {
            "load" => Ok(Self::Load),
            "load_forecast" => Ok(Self::LoadForecast),
            "price" | "lmp" => Ok(Self::Price),
            "price_forecast" | "lmp_forecast" => Ok(Self::PriceForecast),
            "moer" => Ok(Self::Moer),
            "solar_forecast" | "solar_mw" => Ok(Self::SolarForecast),
            "wind_forecast" | "wind_mw" => Ok(Self::WindForecast),
            other => Err(format!("unknown signal kind '{other}'")),
        }
    }
}

/// One normalized observation of a state-like series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub region_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: SignalKind,
    pub value: f64,
}

impl MarketSignal {
    pub fn new(
        region_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        kind: SignalKind,
        value: f64,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            timestamp,
            kind,
            value,
        }
    }
}

/// One point of an issued forecast vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub region_id: String,
    pub kind: SignalKind,
    /// When the forecast was published
    pub issued_at: DateTime<Utc>,
    /// Offset of the forecast target from `issued_at`, in seconds
    pub horizon_offset_secs: i64,
    pub value: f64,
}

impl ForecastRecord {
    /// Wall-clock time this point forecasts
    ///
    /// `None` when the offset moves the target outside the representable range.
    pub fn target_time(&self) -> Option<DateTime<Utc>> {
        Duration::try_seconds(self.horizon_offset_secs)
            .and_then(|offset| self.issued_at.checked_add_signed(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_roundtrip_through_str() {
        for kind in SignalKind::ALL {
            assert_eq!(kind.as_str().parse::<SignalKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!("LMP".parse::<SignalKind>().unwrap(), SignalKind::Price);
        assert_eq!(" solar_mw ".parse::<SignalKind>().unwrap(), SignalKind::SolarForecast);
        assert!("voltage".parse::<SignalKind>().is_err());
    }

    #[test]
    fn test_forecast_classification() {
        assert!(!SignalKind::Price.is_forecast());
        assert!(SignalKind::PriceForecast.is_forecast());
        assert_eq!(SignalKind::LoadForecast.forecast_target(), Some(SignalKind::Load));
        assert_eq!(SignalKind::WindForecast.forecast_target(), None);
    }

    #[test]
    fn test_forecast_target_time() {
        let record = ForecastRecord {
            region_id: "SDGE".to_owned(),
            kind: SignalKind::LoadForecast,
            issued_at: Utc.with_ymd_and_hms(2021, 10, 1, 0, 0, 0).unwrap(),
            horizon_offset_secs: 3600,
            value: 1.0,
        };
        assert_eq!(
            record.target_time(),
            Some(Utc.with_ymd_and_hms(2021, 10, 1, 1, 0, 0).unwrap())
        );

        let far = ForecastRecord {
            horizon_offset_secs: 1_000_000_000_000_000,
            ..record
        };
        assert_eq!(far.target_time(), None);
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&SignalKind::PriceForecast).unwrap();
        assert_eq!(json, "\"price_forecast\"");
    }
}
