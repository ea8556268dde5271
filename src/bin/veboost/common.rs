use tracing_subscriber::{filter::Targets, prelude::*};

use veboost_core::config::LoggingConfig;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.max_level;

    let mut filter = Targets::new().with_target("veboost", level);

    if config.include_escrow {
        filter = filter
            .with_target("veboost_escrow", level)
            .with_target("veboost_core", level);
    }

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish()
        .with(filter)
        .init();

    Ok(())
}
