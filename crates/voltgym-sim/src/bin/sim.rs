// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VoltGym.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::FmtSubscriber;
use voltgym_sim::cli::{Cli, Commands};
use voltgym_sim::commands;

fn main() -> Result<()> {
    // Respects RUST_LOG, logs go to stderr so tables stay clean on stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let output = match &cli.command {
        Commands::Run(args) => commands::run(args)?,
        Commands::Compare(args) => commands::compare(args)?,
        Commands::Coverage(args) => commands::coverage(args)?,
    };
    print!("{output}");
    Ok(())
}
