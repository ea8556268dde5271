use miette::{Context, IntoDiagnostic};
use std::path::PathBuf;

use veboost::{config::Config, scenario::Scenario};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// scenario file (toml)
    scenario: PathBuf,

    /// print the outcome as json instead of tables
    #[arg(long)]
    json: bool,
}

pub fn run(config: &Config, args: &Args) -> miette::Result<()> {
    let scenario = Scenario::load(&args.scenario).context("loading scenario")?;

    let outcome = veboost::scenario::run(&scenario, &config.protocol)?;

    if args.json {
        let json = serde_json::to_string_pretty(&outcome).into_diagnostic()?;
        println!("{json}");
        return Ok(());
    }

    if let Some(name) = &outcome.name {
        println!("scenario: {name}");
    }

    for step in outcome.steps.iter().filter(|x| x.reverted.is_some()) {
        println!(
            "step {} ({}) reverted as expected: {}",
            step.index,
            step.action,
            step.reverted.as_deref().unwrap_or_default()
        );
    }

    for report in outcome.reports.iter() {
        println!();
        println!("== {}", report.title());
        println!(
            "locked: {}, voting supply: {}, votes: {}",
            report.locked_supply, report.voting_supply, report.total_votes
        );

        for (title, table) in report.tables() {
            println!("{title}");
            println!("{table}");
        }
    }

    Ok(())
}
