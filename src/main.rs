use anyhow::Result;
use clap::Parser;
use cmg_backscatter::cli::{execute, Cli, Commands};
use cmg_backscatter::log::{show_farewell_with_timing, show_greeting};
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let start_time = Instant::now();
    let reports_progress = matches!(
        cli.command,
        Commands::Monthly { .. } | Commands::Seasonal { .. } | Commands::Plot { .. }
    );
    if reports_progress {
        show_greeting(cli.command_name());
    }

    execute(&cli)?;

    if reports_progress {
        show_farewell_with_timing(start_time.elapsed());
    }
    Ok(())
}
