// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "voltgym-sim")]
#[command(author, version, about = "VoltGym battery dispatch simulator CLI")]
#[command(
    long_about = "Roll out baseline dispatch policies in the VoltGym environment.\n\
    \nSupports synthetic market scenarios, CSV signal exports and SQLite archives.\n\
    Useful for checking data coverage and reward scales before training agents.\n\
    \nExamples:\n  \
    voltgym-sim run                                # Test split of the default scenario\n  \
    voltgym-sim compare --policies all             # Rank every baseline policy\n  \
    voltgym-sim coverage --signals signals.csv     # Inspect alignment of real data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Roll out policies over training or test episodes
    #[command(
        long_about = "Roll out one or more policies and report per-policy totals.\n\
        \nData Sources (choose one):\n  \
        - Synthetic: --scenario <name> (usual_day, volatile, negative, flat)\n  \
        - CSV: --signals <path> [--forecasts <path>]\n  \
        - Archive: --from-db <path>\n\
        \nExamples:\n  \
        voltgym-sim run\n  \
        voltgym-sim run --scenario volatile --policies threshold,random\n  \
        voltgym-sim run --split train --episodes 20 --seed 7\n  \
        voltgym-sim run --signals caiso.csv --config env.toml --output both --csv-path steps.csv"
    )]
    Run(RunArgs),

    /// Rank policies on the test split
    #[command(
        long_about = "Compare policies side-by-side on every test episode.\n\
        \nDefaults to comparing ALL baseline policies (idle, threshold, random, forecast).\n\
        \nExamples:\n  \
        voltgym-sim compare\n  \
        voltgym-sim compare --scenario negative --rank-by emissions"
    )]
    Compare(CompareArgs),

    /// Report alignment coverage per region
    #[command(
        long_about = "Align the data on the simulation clock and report valid frames,\n\
        valid runs and the number of train and test episodes per region.\n\
        \nExamples:\n  \
        voltgym-sim coverage\n  \
        voltgym-sim coverage --from-db archive.db --step-minutes 15"
    )]
    Coverage(CoverageArgs),
}

/// Where market data comes from
#[derive(Args, Debug, Clone)]
pub struct DataSourceArgs {
    /// Synthetic scenario name (usual_day, volatile, negative, flat)
    #[arg(
        long,
        default_value = "usual_day",
        help = "Synthetic market scenario to simulate",
        long_help = "Available scenarios:\n  \
          - usual_day: Cheap night, solar dip, evening peak\n  \
          - volatile: Large price swings\n  \
          - negative: Negative midday prices\n  \
          - flat: Constant price\n\
          \nIgnored when using --signals or --from-db"
    )]
    pub scenario: String,

    /// Days of synthetic data
    #[arg(long, default_value_t = 14, help = "Number of synthetic days to generate")]
    pub days: u32,

    /// Region id of synthetic data
    #[arg(long, default_value = "SYNTH", help = "Region id for synthetic data")]
    pub region: String,

    /// Seed of the synthetic generator
    #[arg(long, default_value_t = 42, help = "Seed for synthetic data")]
    pub data_seed: u64,

    /// Signals CSV (region_id, timestamp, kind, value)
    #[arg(
        long,
        value_name = "PATH",
        help = "Load state-like signals from CSV",
        long_help = "CSV with columns region_id, timestamp, kind, value.\n\
          Timestamps may be RFC 3339, 'YYYY-MM-DD HH:MM:SS' (UTC) or epoch seconds."
    )]
    pub signals: Option<String>,

    /// Forecast CSV (region_id, issuance_timestamp, horizon_offset, value[, kind])
    #[arg(long, value_name = "PATH", help = "Load issued forecasts from CSV")]
    pub forecasts: Option<String>,

    /// Kind of a forecast CSV without a kind column
    #[arg(long, value_name = "KIND", help = "Forecast kind when the CSV has no kind column")]
    pub forecast_kind: Option<String>,

    /// SQLite archive to load instead of CSV or synthetic data
    #[arg(long, value_name = "PATH", help = "Load signals from a SQLite archive")]
    pub from_db: Option<String>,

    /// Save the loaded data to a SQLite archive
    #[arg(long, value_name = "PATH", help = "Archive the loaded data to SQLite")]
    pub save_db: Option<String>,
}

/// Environment parameters
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Environment configuration file (TOML or JSON)
    #[arg(
        long,
        value_name = "PATH",
        help = "Environment configuration (TOML or JSON)",
        long_help = "Full environment configuration. Without it the split is placed\n\
          at 70% of the data coverage and the remaining flags apply."
    )]
    pub config: Option<String>,

    /// End of the training pool (RFC 3339)
    #[arg(long, value_name = "TIMESTAMP", help = "Train frames are before this instant")]
    pub train_end: Option<String>,

    /// Start of the test pool (RFC 3339)
    #[arg(long, value_name = "TIMESTAMP", help = "Test frames are at or after this instant")]
    pub test_start: Option<String>,

    /// Decisions per episode
    #[arg(long, help = "Steps per episode (default 288)")]
    pub steps: Option<usize>,

    /// Minutes per step
    #[arg(long, help = "Simulation step in minutes (default 5)")]
    pub step_minutes: Option<i64>,

    /// Battery capacity in kWh
    #[arg(long, help = "Battery capacity in kilowatt-hours (must be > 0)")]
    pub capacity: Option<f64>,

    /// Forecast mode: none, oracle, issued
    #[arg(long, value_parser = ["none", "oracle", "issued"], help = "Forecast slice in observations")]
    pub forecast: Option<String>,
}

#[derive(Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: DataSourceArgs,

    #[command(flatten)]
    pub env: EnvArgs,

    /// Comma-separated policy ids or "all"
    #[arg(
        long,
        default_value = "idle,threshold",
        help = "Policies to roll out (idle, threshold, random, forecast, all)"
    )]
    pub policies: String,

    /// Split to roll out on
    #[arg(long, default_value = "test", value_parser = ["train", "test"], help = "Episode split")]
    pub split: String,

    /// Training episodes per region
    #[arg(long, default_value_t = 5, help = "Number of seeded training episodes")]
    pub episodes: usize,

    /// Base seed of training resets
    #[arg(long, default_value_t = 0, help = "First seed of training resets")]
    pub seed: u64,

    /// Output format: table, csv, or both
    #[arg(long, default_value = "table",
          value_parser = ["table", "csv", "both"],
          help = "How to display results")]
    pub output: String,

    /// CSV file path (required when output is csv or both)
    #[arg(long, value_name = "PATH", help = "Where to save step-by-step CSV results")]
    pub csv_path: Option<String>,
}

#[derive(Parser)]
pub struct CompareArgs {
    #[command(flatten)]
    pub source: DataSourceArgs,

    #[command(flatten)]
    pub env: EnvArgs,

    /// Comma-separated policy ids or "all"
    #[arg(long, default_value = "all", help = "Policies to compare (defaults to all)")]
    pub policies: String,

    /// Metric to rank policies by
    #[arg(long, default_value = "reward",
          value_parser = ["reward", "economic", "emissions", "cycles"],
          help = "Sort policies by: reward, economic, emissions, or cycles")]
    pub rank_by: String,

    /// Output format: table, csv, or both
    #[arg(long, default_value = "table",
          value_parser = ["table", "csv", "both"],
          help = "How to display results")]
    pub output: String,

    /// CSV file path (required when output is csv or both)
    #[arg(long, value_name = "PATH", help = "Where to save per-episode CSV results")]
    pub csv_path: Option<String>,
}

#[derive(Parser)]
pub struct CoverageArgs {
    #[command(flatten)]
    pub source: DataSourceArgs,

    #[command(flatten)]
    pub env: EnvArgs,
}
