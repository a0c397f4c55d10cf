// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! Output formatters for CLI rollout results.

use anyhow::{Context, Result};
use comfy_table::{Attribute, Cell, Color, Table, presets::UTF8_FULL};
use std::cmp::Ordering;
use std::path::Path;
use voltgym_core::{BatteryEnv, CoverageReport};

use crate::runner::PolicyReport;

/// Formatter for pretty ASCII tables
#[derive(Debug)]
pub struct TableFormatter;

/// Formatter for CSV export
#[derive(Debug)]
pub struct CsvFormatter;

/// Metric policies are ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBy {
    Reward,
    Economic,
    Emissions,
    Cycles,
}

impl RankBy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reward" => Some(Self::Reward),
            "economic" => Some(Self::Economic),
            "emissions" => Some(Self::Emissions),
            "cycles" => Some(Self::Cycles),
            _ => None,
        }
    }

    /// Order `a` before `b` when `a` is better
    fn compare(self, a: &PolicyReport, b: &PolicyReport, capacity_kwh: f64) -> Ordering {
        let (x, y) = match self {
            Self::Reward => (b.total_reward(), a.total_reward()),
            Self::Economic => (b.economic(), a.economic()),
            Self::Emissions => (b.emissions(), a.emissions()),
            // Fewer cycles mean less wear
            Self::Cycles => (a.cycles(capacity_kwh), b.cycles(capacity_kwh)),
        };
        x.partial_cmp(&y).unwrap_or(Ordering::Equal)
    }
}

/// Sort reports best first
pub fn rank_reports<'a>(
    reports: &'a [PolicyReport],
    rank_by: RankBy,
    capacity_kwh: f64,
) -> Vec<&'a PolicyReport> {
    let mut ranked: Vec<&PolicyReport> = reports.iter().collect();
    ranked.sort_by(|a, b| rank_by.compare(a, b, capacity_kwh));
    ranked
}

impl TableFormatter {
    /// Format per-policy totals, best policy highlighted
    pub fn format_reports(reports: &[PolicyReport], rank_by: RankBy, capacity_kwh: f64) -> String {
        let mut output = String::new();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("Policy").add_attribute(Attribute::Bold),
            Cell::new("Episodes").add_attribute(Attribute::Bold),
            Cell::new("Total\nReward").add_attribute(Attribute::Bold),
            Cell::new("Mean Reward\n/ Episode").add_attribute(Attribute::Bold),
            Cell::new("Economic").add_attribute(Attribute::Bold),
            Cell::new("Emissions").add_attribute(Attribute::Bold),
            Cell::new("Cycles").add_attribute(Attribute::Bold),
            Cell::new("Infeasible\nSteps").add_attribute(Attribute::Bold),
        ]);

        let ranked = rank_reports(reports, rank_by, capacity_kwh);
        for (i, report) in ranked.iter().enumerate() {
            // Highlight best policy
            let name_cell = if i == 0 {
                Cell::new(&report.policy_name)
                    .fg(Color::Green)
                    .add_attribute(Attribute::Bold)
            } else {
                Cell::new(&report.policy_name)
            };

            table.add_row(vec![
                name_cell,
                Cell::new(report.episodes.len()),
                Cell::new(format!("{:.4}", report.total_reward())),
                Cell::new(format!("{:.4}", report.mean_reward())),
                Cell::new(format!("{:.4}", report.economic())),
                Cell::new(format!("{:.4}", report.emissions())),
                Cell::new(format!("{:.2}", report.cycles(capacity_kwh))),
                Cell::new(format!("{}/{}", report.infeasible_steps(), report.steps())),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');

        let steps = reports.first().map(PolicyReport::steps).unwrap_or(0);
        output.push_str(&format!(
            "Rollout complete: {} policies, {} steps each | Battery: {:.1} kWh\n",
            reports.len(),
            steps,
            capacity_kwh
        ));

        output
    }

    /// Format alignment coverage together with the episode pools
    pub fn format_coverage(env: &BatteryEnv) -> Result<String> {
        let mut output = String::new();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec![
            Cell::new("Region").add_attribute(Attribute::Bold),
            Cell::new("Window").add_attribute(Attribute::Bold),
            Cell::new("Valid Frames").add_attribute(Attribute::Bold),
            Cell::new("Runs\n(longest)").add_attribute(Attribute::Bold),
            Cell::new("Missing").add_attribute(Attribute::Bold),
            Cell::new("Train\nStarts").add_attribute(Attribute::Bold),
            Cell::new("Test\nEpisodes").add_attribute(Attribute::Bold),
        ]);

        for report in env.coverage_reports() {
            let train = env.train_starts(&report.region_id)?.len();
            let test = env.test_episodes(&report.region_id)?.len();
            table.add_row(vec![
                Cell::new(&report.region_id),
                Cell::new(window(&report)),
                Cell::new(format!("{}/{}", report.valid_frames, report.frames)),
                Cell::new(format!("{} ({})", report.runs, report.longest_run)),
                Cell::new(missing(&report)),
                Cell::new(train),
                Cell::new(test),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');

        let config = env.config();
        output.push_str(&format!(
            "Step: {} min | Episode: {} steps | Train before {} | Test from {}\n",
            config.episode.step_minutes,
            config.episode.steps,
            config.split.train_end.format("%Y-%m-%d %H:%M"),
            config.split.test_start.format("%Y-%m-%d %H:%M"),
        ));

        Ok(output)
    }
}

fn window(report: &CoverageReport) -> String {
    match (report.start, report.end) {
        (Some(start), Some(end)) => format!(
            "{} - {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ),
        _ => "-".to_string(),
    }
}

fn missing(report: &CoverageReport) -> String {
    if report.missing_by_kind.is_empty() {
        return "-".to_string();
    }
    report
        .missing_by_kind
        .iter()
        .map(|(kind, count)| format!("{kind}: {count}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl CsvFormatter {
    /// Export step-by-step records of every policy
    pub fn write_steps(path: &Path, reports: &[PolicyReport]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for record in reports
            .iter()
            .flat_map(|report| &report.episodes)
            .flat_map(|episode| &episode.records)
        {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Export one row per episode and policy
    pub fn write_episodes(path: &Path, reports: &[PolicyReport]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        for episode in reports.iter().flat_map(|report| &report.episodes) {
            writer.serialize(episode)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{EpisodeSummary, StepRecord};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;
    use voltgym_types::{Split, TerminationReason};

    fn report(id: &str, reward: f64, discharged_kwh: f64) -> PolicyReport {
        let start = Utc.with_ymd_and_hms(2021, 10, 1, 0, 0, 0).unwrap();
        PolicyReport {
            policy_id: id.to_owned(),
            policy_name: id.to_uppercase(),
            episodes: vec![EpisodeSummary {
                policy: id.to_owned(),
                region_id: "SDGE".to_owned(),
                split: Split::Test,
                start,
                steps: 2,
                total_reward: reward,
                economic: reward,
                emissions: 0.0,
                infeasibility: 0.0,
                charged_kwh: 0.0,
                discharged_kwh,
                infeasible_steps: 0,
                final_soc: 0.5,
                termination: Some(TerminationReason::Horizon),
                records: vec![
                    StepRecord {
                        policy: id.to_owned(),
                        region_id: "SDGE".to_owned(),
                        timestamp: start,
                        price: 50.0,
                        soc: 0.5,
                        requested_kw: 0.0,
                        realized_kw: 0.0,
                        grid_energy_kwh: 0.0,
                        reward: 0.0,
                        infeasible: false,
                    };
                    2
                ],
            }],
        }
    }

    #[test]
    fn test_ranking() {
        let reports = vec![report("idle", 0.0, 0.0), report("threshold", 1.5, 40.0)];

        let by_reward = rank_reports(&reports, RankBy::Reward, 50.0);
        assert_eq!(by_reward[0].policy_id, "threshold");

        let by_cycles = rank_reports(&reports, RankBy::Cycles, 50.0);
        assert_eq!(by_cycles[0].policy_id, "idle");
    }

    #[test]
    fn test_table_lists_every_policy() {
        let reports = vec![report("idle", 0.0, 0.0), report("threshold", 1.5, 40.0)];
        let table = TableFormatter::format_reports(&reports, RankBy::Reward, 50.0);
        assert!(table.contains("IDLE"));
        assert!(table.contains("THRESHOLD"));
        assert!(table.contains("0.80"));
        assert!(table.contains("2 policies"));
    }

    #[test]
    fn test_csv_exports() {
        let dir = TempDir::new().unwrap();
        let reports = vec![report("idle", 0.0, 0.0), report("threshold", 1.5, 40.0)];

        let steps = dir.path().join("steps.csv");
        CsvFormatter::write_steps(&steps, &reports).unwrap();
        let content = fs::read_to_string(&steps).unwrap();
        assert!(content.starts_with("policy,region_id,timestamp,price"));
        assert_eq!(content.lines().count(), 1 + 4);

        let episodes = dir.path().join("episodes.csv");
        CsvFormatter::write_episodes(&episodes, &reports).unwrap();
        let content = fs::read_to_string(&episodes).unwrap();
        assert_eq!(content.lines().count(), 1 + 2);
        assert!(content.contains("threshold"));
    }

    #[test]
    fn test_rank_by_parse() {
        assert_eq!(RankBy::parse("cycles"), Some(RankBy::Cycles));
        assert_eq!(RankBy::parse("profit"), None);
    }
}
