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

//! Subcommand implementations. Each returns the text to print.

use anyhow::{Context, Result, bail};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use voltgym_core::BatteryEnv;
use voltgym_types::Split;

use crate::cli::{
    CompareArgs, CoverageArgs, CsvFormatter, DataSourceArgs, EnvArgs, RankBy, RunArgs,
    TableFormatter, build_env_config, load_store,
};
use crate::policies::parse_policies;
use crate::runner::{EpisodeSelection, PolicyReport, evaluate_policies};

/// Load the data and build an environment over every aligned region
pub fn build_env(source: &DataSourceArgs, env_args: &EnvArgs) -> Result<BatteryEnv> {
    let store = load_store(source)?;
    let config = build_env_config(env_args, &store)?;
    let env = BatteryEnv::new(Arc::new(store), config).context("Failed to build environment")?;
    if let Some(name) = env.forecaster_name() {
        info!("Forecast source: {}", name);
    }
    Ok(env)
}

fn region_ids(env: &BatteryEnv) -> Vec<String> {
    env.regions().into_iter().map(str::to_owned).collect()
}

/// Resolve the CSV destination of `--output csv|both`
fn csv_target<'a>(output: &str, csv_path: Option<&'a str>) -> Result<Option<&'a Path>> {
    match output {
        "csv" | "both" => match csv_path {
            Some(path) => Ok(Some(Path::new(path))),
            None => bail!("--csv-path is required when --output is {output}"),
        },
        _ => Ok(None),
    }
}

pub fn run(args: &RunArgs) -> Result<String> {
    let csv_path = csv_target(&args.output, args.csv_path.as_deref())?;
    let policies = parse_policies(&args.policies)?;
    let env = build_env(&args.source, &args.env)?;

    let selection = match args.split.parse::<Split>().map_err(|e| anyhow::anyhow!(e))? {
        Split::Test => EpisodeSelection::Test,
        Split::Train => EpisodeSelection::Train {
            episodes: args.episodes,
            base_seed: args.seed,
        },
    };
    let reports = evaluate_policies(&env, policies, &region_ids(&env), selection)?;

    let mut output = String::new();
    if args.output != "csv" {
        output.push_str(&TableFormatter::format_reports(
            &reports,
            RankBy::Reward,
            env.config().battery.capacity_kwh,
        ));
    }
    if let Some(path) = csv_path {
        CsvFormatter::write_steps(path, &reports)?;
        output.push_str(&format!("Step records saved to {}\n", path.display()));
    }
    Ok(output)
}

pub fn compare(args: &CompareArgs) -> Result<String> {
    let csv_path = csv_target(&args.output, args.csv_path.as_deref())?;
    let rank_by = RankBy::parse(&args.rank_by)
        .with_context(|| format!("Unknown ranking metric '{}'", args.rank_by))?;
    let policies = parse_policies(&args.policies)?;
    let env = build_env(&args.source, &args.env)?;

    let reports = evaluate_policies(&env, policies, &region_ids(&env), EpisodeSelection::Test)?;
    log_winner(&reports, rank_by, env.config().battery.capacity_kwh);

    let mut output = String::new();
    if args.output != "csv" {
        output.push_str(&TableFormatter::format_reports(
            &reports,
            rank_by,
            env.config().battery.capacity_kwh,
        ));
    }
    if let Some(path) = csv_path {
        CsvFormatter::write_episodes(path, &reports)?;
        output.push_str(&format!("Episode results saved to {}\n", path.display()));
    }
    Ok(output)
}

pub fn coverage(args: &CoverageArgs) -> Result<String> {
    let env = build_env(&args.source, &args.env)?;
    TableFormatter::format_coverage(&env)
}

fn log_winner(reports: &[PolicyReport], rank_by: RankBy, capacity_kwh: f64) {
    let ranked = crate::cli::formatters::rank_reports(reports, rank_by, capacity_kwh);
    if let Some(best) = ranked.first() {
        info!(
            "Best policy by {:?}: {} (reward {:.4})",
            rank_by,
            best.policy_name,
            best.total_reward()
        );
    }
}
