use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use veboost::config::Config;

mod common;
mod schedule;
mod simulate;

#[derive(Debug, Subcommand)]
enum Command {
    /// Replays a scenario file and prints the resulting reports
    Simulate(simulate::Args),
    /// Prints the emission schedule of the configured protocol
    Schedule(schedule::Args),
}

#[derive(Debug, Parser)]
#[clap(name = "veboost")]
#[clap(bin_name = "veboost")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = Config::new(&args.config).into_diagnostic()?;

    common::setup_tracing(&config.logging)?;

    match args.command {
        Command::Simulate(x) => simulate::run(&config, &x)?,
        Command::Schedule(x) => schedule::run(&config, &x)?,
    };

    Ok(())
}
