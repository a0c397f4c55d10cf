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

//! Projection of irregular series onto a fixed simulation clock.
//!
//! State-like series (load, price, moer) use the latest observation at or
//! before each frame, as long as it is no older than the staleness limit.
//! Forecast series use the latest issue published at or before the frame
//! that is young enough and whose targets reach the whole lookahead; within
//! an issue each target step takes the latest point at or before it.
//!
//! Frames lacking any required value are kept on the clock but marked
//! invalid, which splits the sequence into valid runs.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use voltgym_types::{AlignedFrame, AlignmentConfig, FrameValidity, SignalKind};

use crate::error::DataGapError;
use crate::store::{ForecastIssue, TimeSeriesStore};

/// Fixed-step frame sequence of one region
#[derive(Debug, Clone)]
pub struct AlignedRegion {
    region_id: String,
    step: Duration,
    frames: Vec<AlignedFrame>,
    runs: Vec<Range<usize>>,
}

impl AlignedRegion {
    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    pub fn frames(&self) -> &[AlignedFrame] {
        &self.frames
    }

    pub fn frame(&self, idx: usize) -> Option<&AlignedFrame> {
        self.frames.get(idx)
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.frames.first().map(|f| f.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.frames.last().map(|f| f.timestamp)
    }

    /// Index of the frame stamped exactly `at`
    pub fn index_of(&self, at: DateTime<Utc>) -> Option<usize> {
        let start = self.start()?;
        if at < start {
            return None;
        }
        let offset = (at - start).num_seconds();
        let step = self.step.num_seconds();
        if step <= 0 || offset % step != 0 {
            return None;
        }
        let idx = (offset / step) as usize;
        (idx < self.frames.len()).then_some(idx)
    }

    /// Maximal ranges of consecutive valid frames
    pub fn valid_runs(&self) -> &[Range<usize>] {
        &self.runs
    }

    /// Valid runs long enough to hold `min_frames` frames
    pub fn runs_with_at_least(&self, min_frames: usize) -> impl Iterator<Item = Range<usize>> + '_ {
        self.runs
            .iter()
            .filter(move |run| run.len() >= min_frames)
            .cloned()
    }

    pub fn valid_frame_count(&self) -> usize {
        self.runs.iter().map(|run| run.len()).sum()
    }

    /// Coverage summary for diagnostics
    pub fn report(&self) -> CoverageReport {
        let mut missing_by_kind = BTreeMap::new();
        for frame in &self.frames {
            for kind in frame.missing_kinds() {
                *missing_by_kind.entry(*kind).or_insert(0) += 1;
            }
        }
        CoverageReport {
            region_id: self.region_id.clone(),
            start: self.start(),
            end: self.end(),
            frames: self.frames.len(),
            valid_frames: self.valid_frame_count(),
            runs: self.runs.len(),
            longest_run: self.runs.iter().map(|run| run.len()).max().unwrap_or(0),
            missing_by_kind,
        }
    }
}

/// Per-region alignment statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub region_id: String,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub frames: usize,
    pub valid_frames: usize,
    pub runs: usize,
    pub longest_run: usize,
    pub missing_by_kind: BTreeMap<SignalKind, usize>,
}

/// Align one region on `[start, end]` with a fixed `step`
///
/// Fails with [`DataGapError`] when no frame of the window is valid; the
/// store is only read.
pub fn align_region(
    store: &TimeSeriesStore,
    region_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    config: &AlignmentConfig,
) -> Result<AlignedRegion, DataGapError> {
    let gap = |kind: SignalKind| DataGapError {
        region_id: region_id.to_owned(),
        kind,
        start,
        end,
    };
    if step <= Duration::zero() || start > end {
        return Err(gap(SignalKind::Load));
    }

    let mut frames = Vec::new();
    let mut t = start;
    while t <= end {
        frames.push(align_frame(store, region_id, t, step, config));
        t += step;
    }

    let runs = valid_runs(&frames);
    if runs.is_empty() {
        let mut counts: BTreeMap<SignalKind, usize> = BTreeMap::new();
        for frame in &frames {
            for kind in frame.missing_kinds() {
                *counts.entry(*kind).or_insert(0) += 1;
            }
        }
        // Name the kind that is missing most often, earliest kind on ties
        let kind = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map_or(SignalKind::Load, |(kind, _)| *kind);
        warn!(
            "No valid coverage for region {} between {} and {} (missing {})",
            region_id, start, end, kind
        );
        return Err(gap(kind));
    }

    let aligned = AlignedRegion {
        region_id: region_id.to_owned(),
        step,
        frames,
        runs,
    };
    let invalid = aligned.frames.len() - aligned.valid_frame_count();
    if invalid > 0 {
        warn!(
            "Region {}: {} of {} frames lack coverage",
            region_id,
            invalid,
            aligned.frames.len()
        );
    }
    info!(
        "Aligned region {}: {} frames, {} valid runs",
        region_id,
        aligned.frames.len(),
        aligned.runs.len()
    );
    Ok(aligned)
}

/// Window to align for a region: configured bounds, else the region's coverage
pub fn region_window(
    store: &TimeSeriesStore,
    region_id: &str,
    config: &AlignmentConfig,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let coverage = store.coverage(region_id);
    let start = config.start.or(coverage.map(|(first, _)| first))?;
    let end = config.end.or(coverage.map(|(_, last)| last))?;
    Some((start, end))
}

/// Align several regions in parallel, one rayon task per region
pub fn align_regions(
    store: &TimeSeriesStore,
    windows: &[(String, DateTime<Utc>, DateTime<Utc>)],
    step: Duration,
    config: &AlignmentConfig,
) -> Result<Vec<AlignedRegion>, DataGapError> {
    windows
        .par_iter()
        .map(|(region_id, start, end)| align_region(store, region_id, *start, *end, step, config))
        .collect()
}

fn align_frame(
    store: &TimeSeriesStore,
    region_id: &str,
    t: DateTime<Utc>,
    step: Duration,
    config: &AlignmentConfig,
) -> AlignedFrame {
    let max_staleness = config.max_staleness();
    let mut missing = Vec::new();

    let mut state_value = |kind: SignalKind| {
        store
            .carried_forward(region_id, kind, t, max_staleness)
            .unwrap_or_else(|| {
                missing.push(kind);
                f64::NAN
            })
    };
    let load = state_value(SignalKind::Load);
    let price = state_value(SignalKind::Price);
    let moer = state_value(SignalKind::Moer);

    let horizon = config.forecast_horizon_steps;
    let mut forecast_horizon_values = BTreeMap::new();
    for kind in &config.forecast_kinds {
        let issue = select_issue(
            store.issues_until(region_id, *kind, t),
            t,
            step,
            horizon,
            config.max_forecast_age(),
        );
        let values = match issue {
            Some(issue) => horizon_values(issue, t, step, horizon),
            None => {
                missing.push(*kind);
                vec![f64::NAN; horizon]
            }
        };
        forecast_horizon_values.insert(*kind, values);
    }

    let validity = if missing.is_empty() {
        FrameValidity::Valid
    } else {
        missing.sort();
        FrameValidity::Invalid { missing }
    };

    AlignedFrame {
        timestamp: t,
        load,
        price,
        moer,
        forecast_horizon_values,
        validity,
    }
}

/// Latest usable issue for a decision at `t`
///
/// `issues` must be the issues published at or before `t`, oldest first.
pub fn select_issue(
    issues: &[ForecastIssue],
    t: DateTime<Utc>,
    step: Duration,
    horizon: usize,
    max_age: Duration,
) -> Option<&ForecastIssue> {
    let first = t + step;
    let last = t + step * horizon as i32;
    issues
        .iter()
        .rev()
        .take_while(|issue| t - issue.issued_at <= max_age)
        .find(|issue| issue.covers(first, last))
}

/// Values of `issue` at `t + j * step` for `j = 1..=horizon`
pub fn horizon_values(
    issue: &ForecastIssue,
    t: DateTime<Utc>,
    step: Duration,
    horizon: usize,
) -> Vec<f64> {
    (1..=horizon)
        .map(|j| issue.value_at(t + step * j as i32).unwrap_or(f64::NAN))
        .collect()
}

fn valid_runs(frames: &[AlignedFrame]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut run_start = None;
    for (idx, frame) in frames.iter().enumerate() {
        match (frame.is_valid(), run_start) {
            (true, None) => run_start = Some(idx),
            (false, Some(start)) => {
                runs.push(start..idx);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        runs.push(start..frames.len());
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use voltgym_types::{ForecastRecord, MarketSignal};

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2021, 10, 1, hour, minute, 0).unwrap()
    }

    fn signals_every(minutes: i64, count: i64, skip: &[i64]) -> Vec<MarketSignal> {
        (0..count)
            .filter(|i| !skip.contains(i))
            .flat_map(|i| {
                let t = ts(0, 0) + Duration::minutes(minutes * i);
                [
                    MarketSignal::new("SDGE", t, SignalKind::Load, 2000.0 + i as f64),
                    MarketSignal::new("SDGE", t, SignalKind::Price, 40.0 + i as f64),
                    MarketSignal::new("SDGE", t, SignalKind::Moer, 900.0 - i as f64),
                ]
            })
            .collect()
    }

    #[test]
    fn test_native_resolution_reproduces_values() {
        let store = TimeSeriesStore::from_records(signals_every(5, 24, &[]), Vec::new()).unwrap();
        let region = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(1, 55),
            Duration::minutes(5),
            &AlignmentConfig::default(),
        )
        .unwrap();

        assert_eq!(region.frames().len(), 24);
        for (frame, (t, price)) in region
            .frames()
            .iter()
            .zip(store.series("SDGE", SignalKind::Price))
        {
            assert_eq!(frame.timestamp, *t);
            assert_eq!(frame.price, *price);
            assert!(frame.is_valid());
        }
        assert_eq!(region.valid_runs(), &[0..24]);
    }

    #[test]
    fn test_locf_fills_finer_clock() {
        let store = TimeSeriesStore::from_records(signals_every(15, 4, &[]), Vec::new()).unwrap();
        let region = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(0, 45),
            Duration::minutes(5),
            &AlignmentConfig::default(),
        )
        .unwrap();

        let prices: Vec<f64> = region.frames().iter().map(|f| f.price).collect();
        assert_eq!(
            prices,
            vec![40.0, 40.0, 40.0, 41.0, 41.0, 41.0, 42.0, 42.0, 42.0, 43.0]
        );
    }

    #[test]
    fn test_stale_values_invalidate_frames() {
        // Hourly data with the 02:00 sample missing and a 60 minute staleness limit
        let store =
            TimeSeriesStore::from_records(signals_every(60, 5, &[2]), Vec::new()).unwrap();
        let config = AlignmentConfig {
            max_staleness_minutes: 60,
            ..AlignmentConfig::default()
        };
        let region = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(4, 0),
            Duration::minutes(30),
            &config,
        )
        .unwrap();

        // 02:00 carries 01:00 (60 min old), 02:30 is 90 min stale
        let validity: Vec<bool> = region.frames().iter().map(AlignedFrame::is_valid).collect();
        assert_eq!(
            validity,
            vec![true, true, true, true, true, false, true, true, true]
        );
        assert_eq!(region.valid_runs(), &[0..5, 6..9]);
        assert_eq!(
            region.frames()[5].missing_kinds(),
            &[SignalKind::Load, SignalKind::Price, SignalKind::Moer]
        );
        assert_eq!(region.runs_with_at_least(4).count(), 1);
    }

    #[test]
    fn test_unknown_region_is_data_gap() {
        let store = TimeSeriesStore::from_records(signals_every(5, 4, &[]), Vec::new()).unwrap();
        let before = store.signal_count();

        let err = align_region(
            &store,
            "PGAE",
            ts(0, 0),
            ts(1, 0),
            Duration::minutes(5),
            &AlignmentConfig::default(),
        )
        .unwrap_err();

        assert_eq!(err.region_id, "PGAE");
        assert_eq!(err.start, ts(0, 0));
        assert_eq!(err.end, ts(1, 0));
        assert_eq!(store.signal_count(), before);
    }

    #[test]
    fn test_data_gap_names_missing_kind() {
        let signals: Vec<MarketSignal> = signals_every(5, 12, &[])
            .into_iter()
            .filter(|s| s.kind != SignalKind::Moer)
            .collect();
        let store = TimeSeriesStore::from_records(signals, Vec::new()).unwrap();
        let err = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(0, 55),
            Duration::minutes(5),
            &AlignmentConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind, SignalKind::Moer);
    }

    #[test]
    fn test_hourly_forecast_on_five_minute_clock() {
        let hourly = |issued: DateTime<Utc>, hours: i64, base: f64| -> Vec<ForecastRecord> {
            (0..hours)
                .map(|h| ForecastRecord {
                    region_id: "SDGE".to_owned(),
                    kind: SignalKind::LoadForecast,
                    issued_at: issued,
                    horizon_offset_secs: h * 3600,
                    value: base + h as f64,
                })
                .collect()
        };
        let mut forecasts = hourly(ts(0, 0), 3, 100.0);
        forecasts.extend(hourly(ts(1, 0), 2, 200.0));
        let store =
            TimeSeriesStore::from_records(signals_every(5, 36, &[]), forecasts).unwrap();

        let config = AlignmentConfig {
            forecast_kinds: vec![SignalKind::LoadForecast],
            forecast_horizon_steps: 1,
            ..AlignmentConfig::default()
        };
        let region = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(2, 55),
            Duration::minutes(5),
            &config,
        )
        .unwrap();

        let value_at = |idx: usize| region.frames()[idx].forecast_horizon_values[&SignalKind::LoadForecast][0];
        // 00:50 looks at 00:55 in the first issue
        assert_eq!(value_at(10), 100.0);
        // 00:55 looks at 01:00 in the first issue (second not yet published)
        assert_eq!(value_at(11), 101.0);
        // 01:00 switches to the second issue
        assert_eq!(value_at(12), 200.0);
        // 01:55 still reaches 02:00, 02:00 needs 02:05 which neither issue covers
        assert!(region.frames()[23].is_valid());
        assert!(!region.frames()[24].is_valid());
        assert_eq!(region.valid_runs(), &[0..24]);
    }

    #[test]
    fn test_old_forecast_issue_rejected() {
        let forecasts = vec![ForecastRecord {
            region_id: "SDGE".to_owned(),
            kind: SignalKind::PriceForecast,
            issued_at: ts(0, 0),
            horizon_offset_secs: 0,
            value: 1.0,
        }, ForecastRecord {
            region_id: "SDGE".to_owned(),
            kind: SignalKind::PriceForecast,
            issued_at: ts(0, 0),
            horizon_offset_secs: 6 * 3600,
            value: 2.0,
        }];
        let store =
            TimeSeriesStore::from_records(signals_every(60, 5, &[]), forecasts).unwrap();
        let config = AlignmentConfig {
            forecast_kinds: vec![SignalKind::PriceForecast],
            max_forecast_age_hours: 2,
            ..AlignmentConfig::default()
        };
        let region = align_region(&store, "SDGE", ts(0, 0), ts(4, 0), Duration::hours(1), &config).unwrap();
        let validity: Vec<bool> = region.frames().iter().map(AlignedFrame::is_valid).collect();
        assert_eq!(validity, vec![true, true, true, false, false]);
    }

    #[test]
    fn test_index_of() {
        let store = TimeSeriesStore::from_records(signals_every(5, 12, &[]), Vec::new()).unwrap();
        let region = align_region(
            &store,
            "SDGE",
            ts(0, 0),
            ts(0, 55),
            Duration::minutes(5),
            &AlignmentConfig::default(),
        )
        .unwrap();
        assert_eq!(region.index_of(ts(0, 10)), Some(2));
        assert_eq!(region.index_of(ts(0, 12)), None);
        assert_eq!(region.index_of(ts(1, 0)), None);
    }

    #[test]
    fn test_align_regions_in_parallel() {
        let mut signals = signals_every(5, 12, &[]);
        signals.extend(signals_every(5, 12, &[]).into_iter().map(|mut s| {
            s.region_id = "PGAE".to_owned();
            s
        }));
        let store = TimeSeriesStore::from_records(signals, Vec::new()).unwrap();
        let windows = vec![
            ("SDGE".to_owned(), ts(0, 0), ts(0, 55)),
            ("PGAE".to_owned(), ts(0, 0), ts(0, 55)),
        ];

        let regions = align_regions(&store, &windows, Duration::minutes(5), &AlignmentConfig::default()).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region_id(), "SDGE");
        assert_eq!(regions[1].region_id(), "PGAE");

        // Identical inputs give identical frames
        assert_eq!(regions[0].frames(), regions[1].frames());
    }
}
