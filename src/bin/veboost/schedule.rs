use miette::IntoDiagnostic;

use veboost::{
    config::Config,
    report::{schedule_rows, schedule_table},
};
use veboost_core::Clock;
use veboost_escrow::EmissionSchedule;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// first sample, defaults to the emission start
    #[arg(long)]
    from: Option<u64>,

    /// last sample, defaults to ten periods after the first one
    #[arg(long)]
    to: Option<u64>,

    /// seconds between samples, defaults to one period
    #[arg(long)]
    step: Option<u64>,

    /// print rows as json instead of a table
    #[arg(long)]
    json: bool,
}

pub fn run(config: &Config, args: &Args) -> miette::Result<()> {
    let clock = Clock::new(&config.protocol.clock);
    let schedule = EmissionSchedule::new(&config.protocol.emission, clock.now()).into_diagnostic()?;

    let from = args.from.unwrap_or(schedule.start());
    let step = args.step.unwrap_or(schedule.period());
    let to = args
        .to
        .unwrap_or_else(|| from.saturating_add(step.saturating_mul(10)));

    let rows = schedule_rows(&schedule, from, to, step)?;

    if args.json {
        let json = serde_json::to_string_pretty(&rows).into_diagnostic()?;
        println!("{json}");
    } else {
        println!("{}", schedule_table(&rows));
    }

    Ok(())
}
